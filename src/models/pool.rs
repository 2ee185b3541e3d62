use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessStats {
    pub index: usize,
    pub connected: bool,
    pub open_sessions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaseStats {
    pub user_id: String,
    pub process_index: usize,
    pub age_secs: u64,
    pub idle_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub open_sessions: usize,
    pub processes: Vec<ProcessStats>,
    pub leases: Vec<LeaseStats>,
}
