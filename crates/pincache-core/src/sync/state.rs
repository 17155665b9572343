use crate::api::SourceError;
use crate::models::PinId;

/// Where a pin is in its fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Fetching,
    Applying,
    /// The last fetch failed; the previous photo set is still in place.
    Failed,
}

/// Result of one sync trigger.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The pin's photo set was replaced.
    Applied {
        pin: PinId,
        page: u32,
        photos: usize,
        /// Records that had no image URL or whose download failed.
        skipped: usize,
        /// The source has no pages after this one.
        last_page: bool,
    },
    /// Another fetch was in flight; this trigger was dropped.
    Skipped,
    /// The photo source failed; nothing was changed.
    Failed {
        pin: PinId,
        page: u32,
        error: SourceError,
    },
}

impl SyncOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied { .. })
    }

    pub fn photo_count(&self) -> usize {
        match self {
            SyncOutcome::Applied { photos, .. } => *photos,
            _ => 0,
        }
    }

    /// Short status line for a front end.
    pub fn describe(&self) -> String {
        match self {
            SyncOutcome::Applied {
                page,
                photos,
                skipped,
                last_page,
                ..
            } => {
                let mut line = format!("{} photos cached", photos);
                if *skipped > 0 {
                    line.push_str(&format!(", {} skipped", skipped));
                }
                if *last_page {
                    line.push_str(&format!(" (page {}, last page)", page));
                } else {
                    line.push_str(&format!(" (page {})", page));
                }
                line
            }
            SyncOutcome::Skipped => "Already fetching photos".to_string(),
            SyncOutcome::Failed { page, error, .. } => {
                format!("No photos (page {}): {}", page, error)
            }
        }
    }
}
