//! Page sizing and stop conditions for the search API.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    RequestFailed,
    EmptyPage,
    NoNewItems,
    LastPage,
    BudgetReached,
    PageBudgetReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::RequestFailed => "request-failed",
            StopReason::EmptyPage => "empty-page",
            StopReason::NoNewItems => "no-new-items",
            StopReason::LastPage => "last-page",
            StopReason::BudgetReached => "budget-reached",
            StopReason::PageBudgetReached => "page-budget-reached",
        };
        f.write_str(s)
    }
}

/// What one page produced, as seen by the controller.
#[derive(Debug, Clone, Default)]
pub struct PageReport {
    pub failed: bool,
    pub items: usize,
    pub new_items: usize,
    pub total: Option<usize>,
    pub page_size: Option<usize>,
}

impl PageReport {
    pub fn failed() -> Self {
        Self { failed: true, ..Default::default() }
    }
}

#[derive(Debug, Clone)]
pub struct PaginationController {
    page: u32,
    page_budget: u32,
    default_page_size: usize,
    max_page_size: usize,
    result_budget: Option<usize>,
}

impl PaginationController {
    pub fn new(page_budget: u32, default_page_size: usize, max_page_size: usize, result_budget: Option<usize>) -> Self {
        Self {
            page: 1,
            page_budget: page_budget.max(1),
            default_page_size,
            max_page_size,
            result_budget,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// `None` when no request should be issued (nothing left to fetch).
    pub fn page_size(&self, emitted: usize) -> Option<usize> {
        let mut size = self.default_page_size.min(self.max_page_size);
        if let Some(budget) = self.result_budget {
            size = size.min(budget.saturating_sub(emitted));
        }
        (size > 0).then_some(size)
    }

    /// Checked after every page, in priority order. `None` advances to the next page.
    pub fn after_page(&mut self, report: &PageReport, emitted: usize) -> Option<StopReason> {
        if report.failed {
            return Some(StopReason::RequestFailed);
        }
        if report.items == 0 {
            return Some(StopReason::EmptyPage);
        }
        if report.new_items == 0 {
            return Some(StopReason::NoNewItems);
        }
        if let (Some(total), Some(size)) = (report.total, report.page_size) {
            if size > 0 && self.page as usize >= total.div_ceil(size) {
                return Some(StopReason::LastPage);
            }
        }
        if self.result_budget.is_some_and(|b| emitted >= b) {
            return Some(StopReason::BudgetReached);
        }
        if self.page >= self.page_budget {
            return Some(StopReason::PageBudgetReached);
        }

        self.page += 1;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(items: usize, new_items: usize) -> PageReport {
        PageReport { items, new_items, ..Default::default() }
    }

    #[test]
    fn test_page_size_never_exceeds_remaining_default_or_max() {
        let c = PaginationController::new(10, 20, 50, Some(5));
        assert_eq!(c.page_size(0), Some(5));
        assert_eq!(c.page_size(3), Some(2));
        assert_eq!(c.page_size(5), None);
        assert_eq!(c.page_size(9), None);

        let c = PaginationController::new(10, 20, 50, None);
        assert_eq!(c.page_size(1_000), Some(20));

        let c = PaginationController::new(10, 80, 50, Some(1_000));
        assert_eq!(c.page_size(0), Some(50));
    }

    #[test]
    fn test_stop_order() {
        let mut c = PaginationController::new(10, 20, 50, Some(5));
        assert_eq!(c.after_page(&PageReport::failed(), 0), Some(StopReason::RequestFailed));
        assert_eq!(c.after_page(&report(0, 0), 0), Some(StopReason::EmptyPage));
        assert_eq!(c.after_page(&report(3, 0), 0), Some(StopReason::NoNewItems));
        // budget reached but also no new items: no-new-items wins
        assert_eq!(c.after_page(&report(3, 0), 5), Some(StopReason::NoNewItems));
        assert_eq!(c.after_page(&report(3, 3), 5), Some(StopReason::BudgetReached));
        assert_eq!(c.page(), 1);
    }

    #[test]
    fn test_last_page_from_reported_total() {
        let mut c = PaginationController::new(10, 20, 50, None);
        let mut r = report(20, 20);
        r.total = Some(41);
        r.page_size = Some(20);
        assert_eq!(c.after_page(&r, 20), None);
        assert_eq!(c.after_page(&r, 40), None);
        assert_eq!(c.page(), 3);
        assert_eq!(c.after_page(&r, 41), Some(StopReason::LastPage));
    }

    #[test]
    fn test_page_budget() {
        let mut c = PaginationController::new(2, 20, 50, None);
        assert_eq!(c.after_page(&report(1, 1), 1), None);
        assert_eq!(c.after_page(&report(1, 1), 2), Some(StopReason::PageBudgetReached));
        assert_eq!(c.page(), 2);
    }
}
