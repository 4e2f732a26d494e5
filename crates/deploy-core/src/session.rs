use crate::ids::SessionId;
use chrono::{DateTime, Utc};

/// Session metadata tracked by the Session Gateway (spec.md §3). The live
/// transport handle and orchestrator reference themselves live in
/// `deploy-gateway`'s registries, keyed by `SessionId` — this struct is the
/// lightweight bookkeeping record the sweeper inspects.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub client_instance_id: String,
}

impl SessionMeta {
    pub fn new(id: SessionId, client_instance_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_seen: now,
            client_instance_id: client_instance_id.into(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    /// Whether this session has been transport-less past `grace` (spec.md
    /// §5) as of `now`.
    pub fn past_grace(&self, now: DateTime<Utc>, grace: chrono::Duration) -> bool {
        now - self.last_seen > grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_grace_respects_threshold() {
        let mut meta = SessionMeta::new(SessionId::from("s1"), "inst-1");
        meta.last_seen = Utc::now() - chrono::Duration::hours(2);
        assert!(meta.past_grace(Utc::now(), chrono::Duration::hours(1)));
        meta.touch();
        assert!(!meta.past_grace(Utc::now(), chrono::Duration::hours(1)));
    }
}
