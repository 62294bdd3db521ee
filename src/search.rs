// Search orchestrator behind the properties page.
//
// Owns the filter criteria, the page window and the result set, and runs
// every search trigger through remote fetch → normalize → (local filter) →
// paginate. Each trigger bumps a generation counter; a response is applied
// only if no newer trigger started while it was in flight, so overlapping
// searches cannot overwrite each other out of order.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    config::FilterPlacement,
    error::ApiError,
    filter,
    listings_api::ListingSource,
    models::{DealsBody, FilterCriteria, ListingRecord, LoadState, SearchBody},
    normalizer::normalize,
    paginator::{PageSummary, PageWindow, paginate},
};

const SEARCH_NETWORK_ERROR: &str = "Could not load properties (network error).";
const DEALS_NETWORK_ERROR: &str = "Could not load best deals (network error).";

/// What started a search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchTrigger {
    ApplyFilters(FilterCriteria),
    ClearFilters,
    /// `None` searches every city.
    BestDeals { city: Option<String> },
}

impl SearchTrigger {
    fn name(&self) -> &'static str {
        match self {
            SearchTrigger::ApplyFilters(_) => "apply-filters",
            SearchTrigger::ClearFilters => "clear-filters",
            SearchTrigger::BestDeals { .. } => "best-deals",
        }
    }

    fn network_message(&self) -> &'static str {
        match self {
            SearchTrigger::BestDeals { .. } => DEALS_NETWORK_ERROR,
            _ => SEARCH_NETWORK_ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchPhase {
    Idle,
    Loading,
    ReadyWithResults,
    ReadyEmpty,
    Error,
}

/// Snapshot handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchView {
    pub phase: SearchPhase,
    /// Records on the current page only.
    pub records: Vec<ListingRecord>,
    pub summary: PageSummary,
    pub criteria: FilterCriteria,
    /// Set when the results came from the best-deals query.
    pub deals_scope: Option<String>,
    pub error: Option<String>,
}

/// Where a listing sits inside the current result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPosition {
    /// 1-based.
    pub index: usize,
    pub total: usize,
    pub prev_id: Option<String>,
    pub next_id: Option<String>,
}

struct Inner {
    state: LoadState<Vec<ListingRecord>>,
    criteria: FilterCriteria,
    deals_scope: Option<String>,
    window: PageWindow,
    generation: u64,
}

impl Inner {
    fn records(&self) -> &[ListingRecord] {
        self.state.ready().map(Vec::as_slice).unwrap_or(&[])
    }

    fn phase(&self) -> SearchPhase {
        match &self.state {
            LoadState::Idle => SearchPhase::Idle,
            LoadState::Loading => SearchPhase::Loading,
            LoadState::Ready(records) if records.is_empty() => SearchPhase::ReadyEmpty,
            LoadState::Ready(_) => SearchPhase::ReadyWithResults,
            LoadState::Error(_) => SearchPhase::Error,
        }
    }
}

pub struct SearchOrchestrator {
    source: Arc<dyn ListingSource>,
    placement: FilterPlacement,
    inner: Mutex<Inner>,
}

impl SearchOrchestrator {
    pub fn new(source: Arc<dyn ListingSource>, placement: FilterPlacement, page_size: usize) -> Self {
        SearchOrchestrator {
            source,
            placement,
            inner: Mutex::new(Inner {
                state: LoadState::Idle,
                criteria: FilterCriteria::default(),
                deals_scope: None,
                window: PageWindow::new(page_size),
                generation: 0,
            }),
        }
    }

    /// One-time initial load: an unfiltered search, skipped once any search ran.
    pub async fn load_if_idle(&self) -> SearchPhase {
        let phase = self.inner.lock().await.phase();
        if phase == SearchPhase::Idle {
            self.clear_filters().await
        } else {
            phase
        }
    }

    pub async fn apply_filters(&self, criteria: FilterCriteria) -> SearchPhase {
        self.run(SearchTrigger::ApplyFilters(criteria.cleaned())).await
    }

    pub async fn clear_filters(&self) -> SearchPhase {
        self.run(SearchTrigger::ClearFilters).await
    }

    pub async fn best_deals(&self, city: Option<String>) -> SearchPhase {
        let city = city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        self.run(SearchTrigger::BestDeals { city }).await
    }

    pub async fn run(&self, trigger: SearchTrigger) -> SearchPhase {
        let generation = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            inner.state = LoadState::Loading;
            inner.window = inner.window.reset();
            match &trigger {
                SearchTrigger::ApplyFilters(criteria) => {
                    inner.criteria = criteria.clone();
                    inner.deals_scope = None;
                }
                SearchTrigger::ClearFilters => {
                    inner.criteria = FilterCriteria::default();
                    inner.deals_scope = None;
                }
                SearchTrigger::BestDeals { city } => {
                    inner.deals_scope = Some(city.clone().unwrap_or_else(|| "all cities".to_string()));
                }
            }
            inner.generation
        };
        tracing::info!(generation, trigger = trigger.name(), "Search started");

        let outcome = self.fetch(&trigger).await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            tracing::debug!(generation, latest = inner.generation, "Discarding stale search response");
            return inner.phase();
        }
        match outcome {
            Ok(records) => {
                tracing::info!(generation, count = records.len(), "Search finished");
                inner.state = LoadState::Ready(records);
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "Search failed");
                inner.state = LoadState::Error(e.user_message(trigger.network_message()));
            }
        }
        inner.window = inner.window.reset();
        inner.phase()
    }

    async fn fetch(&self, trigger: &SearchTrigger) -> Result<Vec<ListingRecord>, ApiError> {
        match trigger {
            SearchTrigger::ApplyFilters(criteria) => match self.placement {
                FilterPlacement::Remote => {
                    let raw = self.source.search(&criteria.search_body()).await?;
                    Ok(filter::apply(normalize_all(&raw), &criteria.local_only()))
                }
                FilterPlacement::Local => {
                    let raw = self.source.search(&SearchBody::default()).await?;
                    Ok(filter::apply(normalize_all(&raw), criteria))
                }
            },
            SearchTrigger::ClearFilters => {
                let raw = self.source.search(&SearchBody::default()).await?;
                Ok(normalize_all(&raw))
            }
            SearchTrigger::BestDeals { city } => {
                let raw = self.source.best_deals(&DealsBody { city: city.clone() }).await?;
                Ok(normalize_all(&raw))
            }
        }
    }

    /// Moves to `page`, clamped to the available pages.
    pub async fn go_to_page(&self, page: usize) -> PageSummary {
        let mut inner = self.inner.lock().await;
        let total = inner.records().len();
        inner.window = inner.window.at(page, total);
        paginate(inner.records(), inner.window).1
    }

    /// No-op on the last page.
    pub async fn next_page(&self) -> PageSummary {
        let page = self.inner.lock().await.window.page();
        self.go_to_page(page + 1).await
    }

    /// No-op on the first page.
    pub async fn prev_page(&self) -> PageSummary {
        let page = self.inner.lock().await.window.page();
        self.go_to_page(page.saturating_sub(1)).await
    }

    pub async fn view(&self) -> SearchView {
        let inner = self.inner.lock().await;
        let (slice, summary) = paginate(inner.records(), inner.window);
        SearchView {
            phase: inner.phase(),
            records: slice.to_vec(),
            summary,
            criteria: inner.criteria.clone(),
            deals_scope: inner.deals_scope.clone(),
            error: inner.state.error().map(str::to_owned),
        }
    }

    pub async fn find(&self, id: &str) -> Option<ListingRecord> {
        let inner = self.inner.lock().await;
        inner.records().iter().find(|r| r.id == id).cloned()
    }

    pub async fn position(&self, id: &str) -> Option<ListingPosition> {
        let inner = self.inner.lock().await;
        let records = inner.records();
        let idx = records.iter().position(|r| r.id == id)?;
        Some(ListingPosition {
            index: idx + 1,
            total: records.len(),
            prev_id: idx.checked_sub(1).map(|i| records[i].id.clone()),
            next_id: records.get(idx + 1).map(|r| r.id.clone()),
        })
    }
}

pub fn normalize_all(raw: &[serde_json::Value]) -> Vec<ListingRecord> {
    raw.iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use crate::testing::FakeApi;
    use serde_json::json;
    use std::time::Duration;

    fn orchestrator(api: &Arc<FakeApi>, placement: FilterPlacement) -> SearchOrchestrator {
        SearchOrchestrator::new(api.clone(), placement, 10)
    }

    fn ids(view: &SearchView) -> Vec<String> {
        view.records.iter().map(|r| r.id.clone()).collect()
    }

    fn portland_window() -> FilterCriteria {
        FilterCriteria {
            city: Some("Portland".into()),
            min_rent: Some(800.0),
            max_rent: Some(1500.0),
            ..FilterCriteria::default()
        }
    }

    #[tokio::test]
    async fn starts_idle_with_one_empty_page() {
        let api = Arc::new(FakeApi::default());
        let view = orchestrator(&api, FilterPlacement::Remote).view().await;
        assert_eq!(view.phase, SearchPhase::Idle);
        assert!(view.records.is_empty());
        assert_eq!(view.summary.page, 1);
        assert_eq!(view.summary.total_pages, 1);
        assert!(api.search_bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn initial_load_happens_once() {
        let api = Arc::new(FakeApi::with_rows(fixtures::raw_rows()));
        let search = orchestrator(&api, FilterPlacement::Remote);

        assert_eq!(search.load_if_idle().await, SearchPhase::ReadyWithResults);
        search.load_if_idle().await;
        assert_eq!(api.search_bodies.lock().unwrap().as_slice(), [SearchBody::default()]);
    }

    #[tokio::test]
    async fn portland_search_filters_locally() {
        let api = Arc::new(FakeApi::with_rows(fixtures::raw_rows()));
        let search = orchestrator(&api, FilterPlacement::Local);

        let phase = search.apply_filters(portland_window()).await;
        assert_eq!(phase, SearchPhase::ReadyWithResults);

        let view = search.view().await;
        assert_eq!(ids(&view), vec!["1", "3"]);
        assert_eq!(view.summary.total, 2);
        assert_eq!(view.summary.page, 1);
        // local placement fetches everything unfiltered
        assert_eq!(api.search_bodies.lock().unwrap()[0], SearchBody::default());
    }

    #[tokio::test]
    async fn remote_placement_sends_criteria() {
        let api = Arc::new(FakeApi::with_rows(fixtures::raw_rows()));
        let search = orchestrator(&api, FilterPlacement::Remote);

        search.apply_filters(portland_window()).await;
        let body = api.search_bodies.lock().unwrap()[0].clone();
        assert_eq!(body, portland_window().search_body());
        assert_eq!(ids(&search.view().await), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn remote_and_local_filtering_agree() {
        let criteria_sets = vec![
            FilterCriteria::default(),
            portland_window(),
            FilterCriteria { city: Some("PORT".into()), ..FilterCriteria::default() },
            FilterCriteria { min_beds: Some(1.0), min_baths: Some(1.5), ..FilterCriteria::default() },
            FilterCriteria { max_rent: Some(950.0), available_only: true, ..FilterCriteria::default() },
            FilterCriteria { city: Some("Lewiston".into()), ..FilterCriteria::default() },
        ];
        for criteria in criteria_sets {
            let api = Arc::new(FakeApi::with_rows(fixtures::raw_rows()));
            let remote = orchestrator(&api, FilterPlacement::Remote);
            let local = orchestrator(&api, FilterPlacement::Local);
            remote.apply_filters(criteria.clone()).await;
            local.apply_filters(criteria.clone()).await;
            assert_eq!(ids(&remote.view().await), ids(&local.view().await), "criteria {:?}", criteria);
        }
    }

    #[tokio::test]
    async fn failed_search_clears_results_and_resets_page() {
        let api = Arc::new(FakeApi::with_rows(fixtures::numbered(23).iter().map(ListingRecord::to_raw).collect()));
        let search = orchestrator(&api, FilterPlacement::Remote);
        search.clear_filters().await;
        search.go_to_page(3).await;

        api.fail_with(ApiError::Rejected { status: 500, message: "Failed to load properties".into() });
        let phase = search.apply_filters(FilterCriteria::default()).await;
        assert_eq!(phase, SearchPhase::Error);

        let view = search.view().await;
        assert_eq!(view.summary.total, 0);
        assert_eq!(view.summary.page, 1);
        assert_eq!(view.error.as_deref(), Some("Failed to load properties"));

        // errors do not stick
        api.recover();
        assert_eq!(search.clear_filters().await, SearchPhase::ReadyWithResults);
        assert_eq!(search.view().await.error, None);
    }

    #[tokio::test]
    async fn transport_failures_use_generic_messages() {
        let api = Arc::new(FakeApi::default());
        let search = orchestrator(&api, FilterPlacement::Remote);
        api.fail_with(ApiError::Transport("connection refused".into()));

        search.clear_filters().await;
        assert_eq!(search.view().await.error.as_deref(), Some(SEARCH_NETWORK_ERROR));

        search.best_deals(Some("Portland".into())).await;
        assert_eq!(search.view().await.error.as_deref(), Some(DEALS_NETWORK_ERROR));
    }

    #[tokio::test]
    async fn empty_result_is_ready_empty() {
        let api = Arc::new(FakeApi::with_rows(fixtures::raw_rows()));
        let search = orchestrator(&api, FilterPlacement::Remote);
        let phase = search
            .apply_filters(FilterCriteria { city: Some("Lewiston".into()), ..FilterCriteria::default() })
            .await;
        assert_eq!(phase, SearchPhase::ReadyEmpty);
        assert_eq!(search.view().await.summary.total_pages, 1);
    }

    #[tokio::test]
    async fn navigation_is_clamped_and_reset_by_new_searches() {
        let api = Arc::new(FakeApi::with_rows(fixtures::numbered(23).iter().map(ListingRecord::to_raw).collect()));
        let search = orchestrator(&api, FilterPlacement::Remote);
        search.clear_filters().await;

        assert_eq!(search.prev_page().await.page, 1);
        assert_eq!(search.next_page().await.page, 2);
        let last = search.next_page().await;
        assert_eq!((last.start, last.end, last.page), (21, 23, 3));
        assert_eq!(search.next_page().await.page, 3);
        assert_eq!(search.go_to_page(0).await.page, 1);
        assert_eq!(search.go_to_page(4).await.page, 3);

        search.clear_filters().await;
        assert_eq!(search.view().await.summary.page, 1);
    }

    #[tokio::test]
    async fn stale_response_is_discarded() {
        let api = Arc::new(FakeApi::with_rows(vec![
            json!({"PROPERTY_ID": 1, "CITY": "Slowtown", "RENT_COST": 700}),
            json!({"PROPERTY_ID": 2, "CITY": "Fastville", "RENT_COST": 800}),
        ]));
        *api.slow_city.lock().unwrap() = Some(("Slowtown".into(), Duration::from_millis(150)));
        let search = orchestrator(&api, FilterPlacement::Remote);

        let slow = search.apply_filters(FilterCriteria { city: Some("Slowtown".into()), ..FilterCriteria::default() });
        let fast = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            search
                .apply_filters(FilterCriteria { city: Some("Fastville".into()), ..FilterCriteria::default() })
                .await
        };
        let (_, fast_phase) = tokio::join!(slow, fast);
        assert_eq!(fast_phase, SearchPhase::ReadyWithResults);

        let view = search.view().await;
        assert_eq!(ids(&view), vec!["2"]);
        assert_eq!(view.criteria.city.as_deref(), Some("Fastville"));
    }

    #[tokio::test]
    async fn best_deals_sends_city_and_keeps_hint() {
        let api = Arc::new(FakeApi::default());
        *api.deals.lock().unwrap() = vec![
            json!({"id": 8, "city": "Portland", "state": "ME", "rent": 900, "canRent": false, "cityAvgRent": 1400, "rentPctOfCityAvg": 64.3}),
        ];
        let search = orchestrator(&api, FilterPlacement::Remote);

        search.best_deals(Some("  Portland ".into())).await;
        assert_eq!(api.deal_bodies.lock().unwrap()[0], DealsBody { city: Some("Portland".into()) });

        let view = search.view().await;
        assert_eq!(view.deals_scope.as_deref(), Some("Portland"));
        assert_eq!(view.records[0].rent_pct_of_city_avg, Some(64.3));
        assert!(view.records[0].deal_hint().is_some());

        search.best_deals(None).await;
        assert_eq!(api.deal_bodies.lock().unwrap()[1], DealsBody { city: None });
        assert_eq!(search.view().await.deals_scope.as_deref(), Some("all cities"));
    }

    #[tokio::test]
    async fn position_within_full_result_set() {
        let api = Arc::new(FakeApi::with_rows(fixtures::numbered(12).iter().map(ListingRecord::to_raw).collect()));
        let search = orchestrator(&api, FilterPlacement::Remote);
        search.clear_filters().await;

        let first = search.position("1").await.unwrap();
        assert_eq!(first, ListingPosition { index: 1, total: 12, prev_id: None, next_id: Some("2".into()) });
        // records on page 2 are still addressable
        let last = search.position("12").await.unwrap();
        assert_eq!(last.prev_id.as_deref(), Some("11"));
        assert_eq!(last.next_id, None);
        assert!(search.position("99").await.is_none());
        assert_eq!(search.find("5").await.unwrap().rent, Some(1005.0));
    }
}
