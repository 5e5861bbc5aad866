use nutriveda_docs::DietPlanLike;
use nutriveda_docs::samples::sample_plans;
use parking_lot::RwLock;

/// Where the orchestrator looks up diet plans by id.
pub trait PlanSource: Send + Sync {
    fn plan(&self, id: &str) -> Option<DietPlanLike>;

    fn plan_ids(&self) -> Vec<String>;
}

/// Plans resolved for a request, in request order, plus the ids that were
/// not found.
#[derive(Debug, Default)]
pub struct ResolvedPlans {
    pub plans: Vec<DietPlanLike>,
    pub missing: Vec<String>,
}

pub fn resolve_plans(source: &dyn PlanSource, ids: &[String]) -> ResolvedPlans {
    let mut resolved = ResolvedPlans::default();
    for id in ids {
        match source.plan(id) {
            Some(plan) => resolved.plans.push(plan),
            None => resolved.missing.push(id.clone()),
        }
    }
    resolved
}

/// Plans held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryPlanSource {
    plans: RwLock<Vec<DietPlanLike>>,
}

impl InMemoryPlanSource {
    pub fn new(plans: Vec<DietPlanLike>) -> Self {
        Self {
            plans: RwLock::new(plans),
        }
    }

    /// The dashboard's demo plans.
    pub fn with_samples() -> Self {
        Self::new(sample_plans())
    }

    /// Insert or replace a plan by id.
    pub fn upsert(&self, plan: DietPlanLike) {
        let mut plans = self.plans.write();
        match plans.iter_mut().find(|p| p.id == plan.id) {
            Some(existing) => *existing = plan,
            None => plans.push(plan),
        }
    }

    pub fn remove(&self, id: &str) -> Option<DietPlanLike> {
        let mut plans = self.plans.write();
        let index = plans.iter().position(|p| p.id == id)?;
        Some(plans.remove(index))
    }
}

impl PlanSource for InMemoryPlanSource {
    fn plan(&self, id: &str) -> Option<DietPlanLike> {
        self.plans.read().iter().find(|p| p.id == id).cloned()
    }

    fn plan_ids(&self) -> Vec<String> {
        self.plans.read().iter().map(|p| p.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutriveda_docs::samples::diabetes_plan;

    #[test]
    fn resolves_in_request_order_and_reports_missing() {
        let source = InMemoryPlanSource::with_samples();
        let ids = vec![
            "plan-pitta-003".to_string(),
            "nope".to_string(),
            "plan-diabetes-001".to_string(),
        ];
        let resolved = resolve_plans(&source, &ids);
        let got: Vec<&str> = resolved.plans.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(got, vec!["plan-pitta-003", "plan-diabetes-001"]);
        assert_eq!(resolved.missing, vec!["nope".to_string()]);
    }

    #[test]
    fn upsert_replaces_by_id() {
        let source = InMemoryPlanSource::new(vec![diabetes_plan()]);
        let mut updated = diabetes_plan();
        updated.total_calories = 1600.0;
        source.upsert(updated);
        assert_eq!(source.plan_ids().len(), 1);
        assert_eq!(source.plan("plan-diabetes-001").unwrap().total_calories, 1600.0);

        assert!(source.remove("plan-diabetes-001").is_some());
        assert!(source.remove("plan-diabetes-001").is_none());
    }
}
