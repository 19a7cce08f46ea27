//! Worst-wins reduction of named statuses.

use super::{ServiceLevel, ServiceStatus};

/// Summary used when every input is available.
pub const DEFAULT_ALL_AVAILABLE_SUMMARY: &str = "All dependencies are available";

/// Reduce named statuses into one aggregate status.
///
/// The level is the worst input level. When every input is available the
/// summary is `all_available_summary`; otherwise it names the inputs at the
/// worst level, sorted by name. An empty input is treated as all available.
///
/// # Example
/// ```
/// use plugin_status::status::{combine, ServiceLevel, ServiceStatus};
///
/// let search = ServiceStatus::available("ok");
/// let storage = ServiceStatus::degraded("slow writes");
/// let status = combine([("search", &search), ("storage", &storage)], "all good");
/// assert_eq!(status.level, ServiceLevel::Degraded);
/// assert_eq!(status.summary, "[storage]: slow writes");
/// ```
pub fn combine<'a, I>(inputs: I, all_available_summary: &str) -> ServiceStatus
where
    I: IntoIterator<Item = (&'a str, &'a ServiceStatus)>,
{
    let mut worst_level = ServiceLevel::Available;
    let mut worst: Vec<(&str, &ServiceStatus)> = Vec::new();

    for (name, status) in inputs {
        if status.level > worst_level {
            worst_level = status.level;
            worst.clear();
        }
        if status.level == worst_level {
            worst.push((name, status));
        }
    }

    if worst_level.is_available() {
        return ServiceStatus::available(all_available_summary);
    }

    worst.sort_by(|a, b| a.0.cmp(b.0));

    let summary = match worst.as_slice() {
        [(name, status)] => format!("[{}]: {}", name, status.summary),
        _ => {
            let names: Vec<&str> = worst.iter().map(|(name, _)| *name).collect();
            format!(
                "[{}] services are {}: {}",
                worst.len(),
                worst_level,
                names.join(", ")
            )
        }
    };

    ServiceStatus::new(worst_level, summary)
}
