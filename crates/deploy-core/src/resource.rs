use serde::{Deserialize, Serialize};

/// Passed opaquely to the serverless platform call (spec.md §3). Chosen per
/// framework class by the optimizer collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub cpu: String,
    pub memory: String,
    pub concurrency: u32,
    pub min_instances: u32,
    pub max_instances: u32,
}

impl ResourceConfig {
    pub fn default_for_framework(framework: Option<&str>) -> Self {
        match framework {
            Some(f) if f.eq_ignore_ascii_case("django") || f.eq_ignore_ascii_case("rails") => {
                Self {
                    cpu: "2".to_string(),
                    memory: "1Gi".to_string(),
                    concurrency: 40,
                    min_instances: 0,
                    max_instances: 20,
                }
            }
            _ => Self {
                cpu: "1".to_string(),
                memory: "512Mi".to_string(),
                concurrency: 80,
                min_instances: 0,
                max_instances: 10,
            },
        }
    }

    /// Rough hourly cost estimate for a single always-on instance at this
    /// shape, surfaced alongside the deployment record (spec.md §4.4
    /// outputs: "cost estimate from the optimizer collaborator"). Not a
    /// billing quote — a deterministic per-vCPU/per-GiB rate used so the
    /// same shape always produces the same number.
    pub fn estimated_hourly_cost_usd(&self) -> f64 {
        const PER_VCPU_HOUR: f64 = 0.024;
        const PER_GIB_HOUR: f64 = 0.0025;

        let vcpus: f64 = self.cpu.parse().unwrap_or(1.0);
        let gib = parse_memory_gib(&self.memory);
        (vcpus * PER_VCPU_HOUR + gib * PER_GIB_HOUR).max(0.0)
    }
}

fn parse_memory_gib(memory: &str) -> f64 {
    if let Some(value) = memory.strip_suffix("Gi") {
        value.parse().unwrap_or(0.0)
    } else if let Some(value) = memory.strip_suffix("Mi") {
        value.parse::<f64>().unwrap_or(0.0) / 1024.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_cost_for_default_shape() {
        let resources = ResourceConfig::default_for_framework(None);
        let cost = resources.estimated_hourly_cost_usd();
        assert!(cost > 0.0);
    }

    #[test]
    fn django_shape_costs_more_than_default() {
        let default_cost = ResourceConfig::default_for_framework(None).estimated_hourly_cost_usd();
        let django_cost = ResourceConfig::default_for_framework(Some("django")).estimated_hourly_cost_usd();
        assert!(django_cost > default_cost);
    }
}
