//! Metric name and label definitions.
//!
//! Every metric emitted by the workspace is named here so dashboards have a
//! single place to look.

/// Closure workflow metrics
pub mod closure {
    /// Closure attempts that reached a terminal outcome, labelled by `outcome`
    pub const CLOSURES_TOTAL: &str = "tickets_closures_total";
    /// Closure attempts that returned an error, labelled by `kind`
    pub const FAILURES_TOTAL: &str = "tickets_closure_failures_total";
    /// Wall-clock duration of a closure attempt in seconds
    pub const DURATION_SECONDS: &str = "tickets_closure_duration_seconds";
    /// Tickets flagged to be skipped by automatic closure
    pub const AUTOCLOSE_EXCLUSIONS_TOTAL: &str = "tickets_autoclose_exclusions_total";
}

/// Transcript collection metrics
pub mod transcript {
    /// Messages collected into transcripts
    pub const MESSAGES_TOTAL: &str = "tickets_transcript_messages_total";
    /// History pages fetched from the gateway
    pub const PAGES_TOTAL: &str = "tickets_transcript_pages_total";
    /// Transcripts cut short by the per-guild message cap
    pub const TRUNCATED_TOTAL: &str = "tickets_transcript_truncated_total";
}

/// Notification metrics
pub mod notify {
    /// Closure summaries posted to archive channels
    pub const ARCHIVE_MESSAGES_TOTAL: &str = "tickets_archive_messages_total";
    /// Closure summaries sent as direct messages
    pub const DIRECT_MESSAGES_TOTAL: &str = "tickets_direct_messages_total";
}

/// Autoclose sweep metrics
pub mod sweep {
    /// Sweeps run
    pub const RUNS_TOTAL: &str = "tickets_autoclose_sweeps_total";
    /// Tickets processed by sweeps, labelled by `result`
    pub const TICKETS_TOTAL: &str = "tickets_autoclose_tickets_total";
}

/// Standard histogram buckets
pub mod buckets {
    /// Closure duration buckets (in seconds). Large transcripts take many
    /// sequential pages, so the tail is long.
    pub const CLOSURE_DURATION: &[f64] = &[
        0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
    ];
}
