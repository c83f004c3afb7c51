//! Public types for the mirror coordinator.

/// What a `download` or `update` did for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Full tree fetched and written (created or replaced)
    Downloaded {
        count: usize,
        watermark: String,
    },
    /// New records appended to the stored tree
    Updated {
        appended: usize,
        count: usize,
        watermark: String,
    },
    /// Stored tree already reflects the newest record; nothing written
    UpToDate {
        count: usize,
        watermark: String,
    },
    /// Remote fetch failed; local state left unchanged
    Skipped {
        reason: String,
    },
}

impl SyncOutcome {
    /// Whether the outcome leaves the product mirrored and current as far as
    /// this call could tell.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Skipped { .. })
    }

    /// Label used for the `status` metric.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Downloaded { .. } => "downloaded",
            Self::Updated { .. } => "updated",
            Self::UpToDate { .. } => "up_to_date",
            Self::Skipped { .. } => "skipped",
        }
    }
}

impl std::fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Downloaded { count, watermark } => {
                write!(f, "Downloaded({} records, watermark {})", count, watermark)
            }
            Self::Updated { appended, count, watermark } => {
                write!(f, "Updated(+{} → {} records, watermark {})", appended, count, watermark)
            }
            Self::UpToDate { count, watermark } => {
                write!(f, "UpToDate({} records, watermark {})", count, watermark)
            }
            Self::Skipped { reason } => write!(f, "Skipped({})", reason),
        }
    }
}

/// Result of a bulk operation over several products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Total products attempted
    pub total: usize,
    /// Products downloaded/updated/already current
    pub succeeded: usize,
    /// Products skipped or rejected
    pub failed: usize,
}

impl BatchResult {
    /// Check if all products succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub(super) fn record(&mut self, ok: bool) {
        self.total += 1;
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}
