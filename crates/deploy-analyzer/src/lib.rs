mod classify;
mod env_extract;
mod fallback;
mod scan;

pub use classify::{analyze, strip_code_fences};
pub use env_extract::extract_env_var_names;
pub use fallback::static_fallback;
pub use scan::{collect_config_files, CONFIG_FILES};
