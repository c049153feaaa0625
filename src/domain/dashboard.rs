use crate::domain::{
    CategoryCounts, ChangeCategory, DirectoryValidator, DisplayColor, LogEntry, LogStore,
    SessionController, classify, newest_first,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DisplayEntry<'a> {
    pub entry: &'a LogEntry,
    pub category: ChangeCategory,
    pub color: DisplayColor,
}

/// Everything the dashboard draws, derived from the three stateful components.
#[derive(Clone, Debug)]
pub struct DashboardViewModel<'a> {
    pub category_counts: CategoryCounts,
    pub chart_series: Vec<(ChangeCategory, usize)>,
    pub display_log: Vec<DisplayEntry<'a>>,
    pub session_label: &'static str,
    pub validity_label: &'static str,
    pub bound_directory: Option<&'a str>,
    pub loading: bool,
}

impl<'a> DashboardViewModel<'a> {
    pub fn build(
        logs: &'a LogStore,
        session: &'a SessionController,
        validator: &'a DirectoryValidator,
    ) -> Self {
        let entries = logs.entries();
        let category_counts = classify(entries);
        let chart_series = category_counts.iter().collect();
        let display_log = newest_first(entries)
            .map(|entry| {
                let category = entry.category();
                DisplayEntry {
                    entry,
                    category,
                    color: category.color(),
                }
            })
            .collect();

        Self {
            category_counts,
            chart_series,
            display_log,
            session_label: session.label(),
            validity_label: validator.label(),
            bound_directory: session.bound_directory(),
            loading: logs.is_refreshing(),
        }
    }

    pub fn bound_directory_label(&self) -> &str {
        self.bound_directory.unwrap_or("Not selected")
    }

    pub fn total(&self) -> usize {
        self.category_counts.total()
    }
}
