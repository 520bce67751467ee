//! Compiled schedule instances.
//!
//! Construction resolves every plan step to a live schedulable through
//! the registry's factories, instantiates the filter closure level by
//! level, and precomputes the adapter skip table. The result is fully
//! immutable: one instance can drive many `process` invocations, on
//! different root components, from different threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use skein_core::{
    Adapter, ComponentRef, DenseId, FilterId, FilterSet, ItemId, ItemSet, Registry, Runnable,
    SchedulableImpl, TransformSink, Visitor,
};
use skein_plan::Plan;
use skein_trace::{EventId, TraceContext, TraceSnapshot, Tracer};

use crate::error::ProcessError;
use crate::filter::{FilterInstance, SkipEntry};

/// How sibling branches produced by adapters are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Everything on the calling thread, in plan order depth-first.
    Sequential,
    /// Fan out onto a dedicated rayon pool with this many threads;
    /// zero means one per available core.
    Pool(usize),
}

/// What happens to the rest of the schedule when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop dispatching new steps everywhere and return the first
    /// failure. In-flight sibling branches run to completion.
    FailFast,
    /// Abort only the failing branch, drain everything else, and
    /// return all failures together.
    CollectAndAbort,
}

/// Construction-time options for a [`ScheduleInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceOptions {
    pub workers: WorkerMode,
    /// Whether to precompute the adapter skip table.
    pub skip_adapters: bool,
    pub policy: FailurePolicy,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        Self {
            workers: WorkerMode::Pool(0),
            skip_adapters: true,
            policy: FailurePolicy::FailFast,
        }
    }
}

/// One resolved step of the compiled schedule.
struct SchedStep {
    name: String,
    event: EventId,
    /// Leaf steps: the filters that must all hold for the step to run.
    /// Adapter steps: every filter gating a leaf somewhere beneath.
    filters: FilterSet,
    body: StepBody,
}

enum StepBody {
    Runnable(Arc<dyn Runnable>),
    Visitor(Arc<dyn Visitor>),
    Adapter {
        adapter: Arc<dyn Adapter>,
        sub: Box<ScheduleInstance>,
        skip: SkipEntry,
    },
}

/// A plan compiled against a registry, ready to execute.
///
/// The instance owns its [`Tracer`]; every `process` call merges into
/// the same aggregate, so statistics accumulate across invocations.
pub struct ScheduleInstance {
    run_on: ItemId,
    steps: Vec<SchedStep>,
    /// Instances for the filters scoped to this level's granularity;
    /// every filter in the tree is instantiated at exactly one level.
    filter_instances: Vec<FilterInstance>,
    /// Every filter gating a leaf at or beneath this level.
    reachable: FilterSet,
    /// False if some leaf beneath carries no filter at all and thus
    /// always runs.
    all_leaves_filtered: bool,
    options: Arc<InstanceOptions>,
    tracer: Arc<Tracer>,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl std::fmt::Debug for ScheduleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduleInstance")
            .field("run_on", &self.run_on)
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}

impl ScheduleInstance {
    /// Compile `plan` with default options.
    pub fn new(plan: &Plan, registry: &Registry) -> Result<Self, ProcessError> {
        Self::with_options(plan, registry, InstanceOptions::default())
    }

    /// Compile `plan` with explicit options.
    pub fn with_options(
        plan: &Plan,
        registry: &Registry,
        options: InstanceOptions,
    ) -> Result<Self, ProcessError> {
        let options = Arc::new(options);
        let tracer = Arc::new(Tracer::new());
        let mut root = Self::build(plan, registry, &options, &tracer)?;

        if options.skip_adapters {
            let scopes: Vec<ItemId> = (0..registry.filter_count())
                .map(|i| registry.filter(FilterId::from_index(i)).filter_on)
                .collect();
            let mut known = ItemSet::new();
            known.insert(plan.run_on());
            root.mark_skippable(&known, &scopes);
        }

        root.pool = match options.workers {
            WorkerMode::Sequential => None,
            WorkerMode::Pool(threads) => {
                let mut builder = rayon::ThreadPoolBuilder::new();
                if threads > 0 {
                    builder = builder.num_threads(threads);
                }
                let pool = builder
                    .build()
                    .map_err(|e| ProcessError::Pool(e.to_string()))?;
                Some(Arc::new(pool))
            }
        };

        tracing::debug!(
            run_on = %registry.item_name(plan.run_on()),
            steps = plan.flat_len(),
            filters = root.reachable.len(),
            "compiled schedule instance"
        );
        Ok(root)
    }

    fn build(
        plan: &Plan,
        registry: &Registry,
        options: &Arc<InstanceOptions>,
        tracer: &Arc<Tracer>,
    ) -> Result<Self, ProcessError> {
        let mut steps = Vec::with_capacity(plan.len());
        let mut reachable = FilterSet::new();
        let mut all_leaves_filtered = true;

        for plan_step in plan.iter() {
            let descriptor = registry.descriptor(plan_step.id);
            let name = descriptor.name.clone();
            let event = tracer.event(&format!("{}:{}", descriptor.kind, name));

            let produced = registry.instantiate(plan_step.id);
            if produced.kind() != descriptor.kind {
                return Err(ProcessError::Resolve {
                    schedulable: name,
                    reason: format!(
                        "factory produced a {} for a {} descriptor",
                        produced.kind(),
                        descriptor.kind
                    ),
                });
            }

            let (filters, body) = match produced {
                SchedulableImpl::Runnable(runnable) => {
                    let filters: FilterSet = descriptor.filters.iter().copied().collect();
                    all_leaves_filtered &= !filters.is_empty();
                    (filters, StepBody::Runnable(runnable))
                }
                SchedulableImpl::Visitor(visitor) => {
                    let filters: FilterSet = descriptor.filters.iter().copied().collect();
                    all_leaves_filtered &= !filters.is_empty();
                    (filters, StepBody::Visitor(visitor))
                }
                SchedulableImpl::Adapter(adapter) => {
                    let sub_plan = plan_step.sub.as_ref().ok_or_else(|| ProcessError::Resolve {
                        schedulable: name.clone(),
                        reason: "adapter step carries no sub-plan".to_string(),
                    })?;
                    let sub = Self::build(sub_plan, registry, options, tracer)?;
                    all_leaves_filtered &= sub.all_leaves_filtered;
                    (
                        sub.reachable.clone(),
                        StepBody::Adapter {
                            adapter,
                            sub: Box::new(sub),
                            skip: SkipEntry::default(),
                        },
                    )
                }
            };
            reachable.union_with(&filters);
            steps.push(SchedStep {
                name,
                event,
                filters,
                body,
            });
        }

        // Each filter is owned by exactly one level: the one whose
        // granularity matches its scope. Adapter chains never revisit
        // a granularity, so no ancestor shares it.
        let filter_instances = reachable
            .iter()
            .filter(|id| registry.filter(*id).filter_on == plan.run_on())
            .map(|id| {
                let registered = registry.filter(id);
                FilterInstance {
                    id,
                    name: registered.name.clone(),
                    event: tracer.event(&format!("filter:{}", registered.name)),
                    filter: registry.instantiate_filter(id),
                }
            })
            .collect();

        Ok(ScheduleInstance {
            run_on: plan.run_on(),
            steps,
            filter_instances,
            reachable,
            all_leaves_filtered,
            options: Arc::clone(options),
            tracer: Arc::clone(tracer),
            pool: None,
        })
    }

    /// Compute the static skip proof for every adapter step. `known`
    /// holds the component types visible on the branch above.
    fn mark_skippable(&mut self, known: &ItemSet, scopes: &[ItemId]) {
        for step in &mut self.steps {
            if let StepBody::Adapter { sub, skip, .. } = &mut step.body {
                *skip = SkipEntry::compute(&step.filters, sub.all_leaves_filtered, known, scopes);
                let mut below = known.clone();
                below.insert(sub.run_on);
                sub.mark_skippable(&below, scopes);
            }
        }
    }

    // --- Execution ---

    /// Run the whole schedule on one root component.
    pub fn process(&self, data: ComponentRef) -> Result<(), ProcessError> {
        let ctx = RunCtx {
            abort: AtomicBool::new(false),
            policy: self.options.policy,
            errors: Mutex::new(Vec::new()),
            pool: self.pool.as_deref(),
        };
        {
            let mut trace = self.tracer.context();
            self.run_branch(&ctx, &mut trace, &data, &FilterSet::new());
        }

        let mut errors = ctx.errors.into_inner();
        if errors.is_empty() {
            return Ok(());
        }
        match self.options.policy {
            FailurePolicy::FailFast => Err(errors.swap_remove(0)),
            FailurePolicy::CollectAndAbort => Err(ProcessError::Collected(errors)),
        }
    }

    fn run_branch(
        &self,
        ctx: &RunCtx<'_>,
        trace: &mut TraceContext,
        data: &ComponentRef,
        inherited: &FilterSet,
    ) {
        if ctx.aborted() {
            return;
        }
        let current = self.refine_filters(trace, data, inherited);

        for step in &self.steps {
            if ctx.aborted() {
                return;
            }
            match &step.body {
                StepBody::Runnable(runnable) => {
                    if !current.is_superset(&step.filters) {
                        tracing::trace!(step = %step.name, component = %data.identity(), "step filtered out");
                        continue;
                    }
                    let outcome = trace.scoped(step.event, |_| runnable.run(data.as_ref()));
                    if let Err(cause) = outcome {
                        ctx.record(ProcessError::runner(&step.name, data.as_ref(), cause));
                        return;
                    }
                }
                StepBody::Visitor(visitor) => {
                    if !current.is_superset(&step.filters) {
                        tracing::trace!(step = %step.name, component = %data.identity(), "step filtered out");
                        continue;
                    }
                    let outcome = trace.scoped(step.event, |_| {
                        let mut sink = TransformSink::new();
                        visitor.visit(data.as_ref(), &mut sink)?;
                        sink.apply()
                    });
                    if let Err(cause) = outcome {
                        ctx.record(ProcessError::visitor(&step.name, data.as_ref(), cause));
                        return;
                    }
                }
                StepBody::Adapter { adapter, sub, skip } => {
                    if skip.proves_skip(&current) {
                        tracing::trace!(step = %step.name, component = %data.identity(), "sub-plan elided by skip proof");
                        continue;
                    }
                    let stream = match trace.scoped(step.event, |_| adapter.adapt(data)) {
                        Ok(stream) => stream,
                        Err(cause) => {
                            ctx.record(ProcessError::adapter(&step.name, data.as_ref(), cause));
                            return;
                        }
                    };
                    match ctx.pool {
                        None => {
                            for item in stream {
                                if ctx.aborted() {
                                    return;
                                }
                                sub.run_branch(ctx, trace, &item, &current);
                            }
                        }
                        Some(pool) => {
                            let trace_ref: &TraceContext = trace;
                            pool.scope(|scope| {
                                for item in stream {
                                    if ctx.aborted() {
                                        break;
                                    }
                                    let branch_filters = current.clone();
                                    let forked = trace_ref.fork();
                                    scope.spawn(move |_| {
                                        let mut trace = forked;
                                        sub.run_branch(ctx, &mut trace, &item, &branch_filters);
                                    });
                                }
                            });
                        }
                    }
                }
            }
        }
    }

    /// Extend the inherited filter verdicts with this level's own.
    /// Verdicts established above stand as-is; each filter is evaluated
    /// exactly once per branch, at the level whose granularity matches
    /// its scope.
    fn refine_filters(
        &self,
        trace: &mut TraceContext,
        data: &ComponentRef,
        inherited: &FilterSet,
    ) -> FilterSet {
        let mut current = inherited.clone();
        for instance in &self.filter_instances {
            if instance.accept(trace, data) {
                current.insert(instance.id);
            }
        }
        current
    }

    // --- Accessors ---

    /// The component type the root plan runs on.
    pub fn run_on(&self) -> ItemId {
        self.run_on
    }

    /// The shared statistics aggregate.
    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.tracer
    }

    /// Snapshot of everything recorded so far, across all `process`
    /// invocations.
    pub fn statistics(&self) -> TraceSnapshot {
        self.tracer.snapshot()
    }

    /// Steps at this level (sub-plan steps not included).
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

struct RunCtx<'a> {
    abort: AtomicBool,
    policy: FailurePolicy,
    errors: Mutex<Vec<ProcessError>>,
    pool: Option<&'a rayon::ThreadPool>,
}

impl RunCtx<'_> {
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    fn record(&self, error: ProcessError) {
        tracing::debug!(error = %error, "step failed");
        if self.policy == FailurePolicy::FailFast {
            self.abort.store(true, Ordering::Relaxed);
        }
        self.errors.lock().push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use skein_core::{
        Component, ComponentFilter, ComponentStream, Descriptor, ItemKind, StepFailure,
    };
    use skein_plan::Request;

    struct Unit(String);

    impl Component for Unit {
        fn identity(&self) -> String {
            self.0.clone()
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    struct Count(Arc<AtomicUsize>);

    impl Runnable for Count {
        fn run(&self, _data: &dyn Component) -> Result<(), StepFailure> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fail;

    impl Runnable for Fail {
        fn run(&self, _data: &dyn Component) -> Result<(), StepFailure> {
            Err("broken".into())
        }
    }

    /// Yields `n` fresh units, ignoring its input.
    struct FanOut(usize);

    impl Adapter for FanOut {
        fn adapt(&self, data: &ComponentRef) -> Result<ComponentStream, StepFailure> {
            let base = data.identity();
            let items: Vec<ComponentRef> = (0..self.0)
                .map(|i| Arc::new(Unit(format!("{base}/{i}"))) as ComponentRef)
                .collect();
            Ok(Box::new(items.into_iter()))
        }
    }

    struct Never;

    impl ComponentFilter for Never {
        fn accept(&self, _data: &dyn Component) -> bool {
            false
        }
    }

    /// Accepts everything, counting how often it is asked.
    struct Tally(Arc<AtomicUsize>);

    impl ComponentFilter for Tally {
        fn accept(&self, _data: &dyn Component) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn count_factory(hits: &Arc<AtomicUsize>) -> impl Fn() -> SchedulableImpl + Send + Sync {
        let hits = Arc::clone(hits);
        move || SchedulableImpl::Runnable(Arc::new(Count(Arc::clone(&hits))))
    }

    fn sequential() -> InstanceOptions {
        InstanceOptions {
            workers: WorkerMode::Sequential,
            ..InstanceOptions::default()
        }
    }

    #[test]
    fn factory_kind_mismatch_is_a_resolve_error() {
        let mut reg = Registry::new();
        let session = reg.item("session", ItemKind::ComponentType);
        reg.register(Descriptor::visitor("lying", session), || {
            SchedulableImpl::Runnable(Arc::new(Fail))
        })
        .unwrap();
        let registry = Arc::new(reg);

        let mut request = Request::new(Arc::clone(&registry));
        request.add_schedulable("lying").unwrap();
        let plan = request.build_plan(session).unwrap();

        let err = ScheduleInstance::new(&plan, &registry).unwrap_err();
        assert!(matches!(err, ProcessError::Resolve { .. }));
        assert_eq!(err.schedulable(), Some("lying"));
    }

    #[test]
    fn sequential_run_hits_every_step() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut reg = Registry::new();
        let session = reg.item("session", ItemKind::ComponentType);
        reg.register(Descriptor::runnable("a", session), count_factory(&hits))
            .unwrap();
        reg.register(Descriptor::runnable("b", session), count_factory(&hits))
            .unwrap();
        let registry = Arc::new(reg);

        let mut request = Request::new(Arc::clone(&registry));
        request.add_schedulables(["a", "b"]).unwrap();
        let plan = request.build_plan(session).unwrap();

        let instance = ScheduleInstance::with_options(&plan, &registry, sequential()).unwrap();
        instance.process(Arc::new(Unit("s".into()))).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(instance.statistics().event("runnable:a").unwrap().count, 1);
    }

    #[test]
    fn adapter_fans_out_into_the_sub_plan() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut reg = Registry::new();
        let session = reg.item("session", ItemKind::ComponentType);
        let unit = reg.item("unit", ItemKind::ComponentType);
        reg.register(Descriptor::adapter("each-unit", session, unit), || {
            SchedulableImpl::Adapter(Arc::new(FanOut(3)))
        })
        .unwrap();
        reg.register(Descriptor::runnable("leaf", unit), count_factory(&hits))
            .unwrap();
        let registry = Arc::new(reg);

        let mut request = Request::new(Arc::clone(&registry));
        request.add_schedulables(["each-unit", "leaf"]).unwrap();
        let plan = request.build_plan(session).unwrap();

        let instance = ScheduleInstance::with_options(&plan, &registry, sequential()).unwrap();
        instance.process(Arc::new(Unit("s".into()))).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(
            instance.statistics().event("runnable:leaf").unwrap().count,
            3
        );
    }

    #[test]
    fn false_filter_elides_the_whole_adapter() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut reg = Registry::new();
        let session = reg.item("session", ItemKind::ComponentType);
        let unit = reg.item("unit", ItemKind::ComponentType);
        // Scoped to the root granularity, so the proof sees it from
        // above the adapter.
        let gate = reg
            .register_filter("never", session, || Arc::new(Never))
            .unwrap();
        reg.register(Descriptor::adapter("each-unit", session, unit), || {
            SchedulableImpl::Adapter(Arc::new(FanOut(100)))
        })
        .unwrap();
        reg.register(
            Descriptor::runnable("leaf", unit).filter(gate),
            count_factory(&hits),
        )
        .unwrap();
        let registry = Arc::new(reg);

        let mut request = Request::new(Arc::clone(&registry));
        request.add_schedulables(["each-unit", "leaf"]).unwrap();
        let plan = request.build_plan(session).unwrap();

        let instance = ScheduleInstance::with_options(&plan, &registry, sequential()).unwrap();
        instance.process(Arc::new(Unit("s".into()))).unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        let snap = instance.statistics();
        assert_eq!(snap.event("adapter:each-unit").unwrap().count, 0);
        assert_eq!(snap.event("filter:never").unwrap().count, 1);
    }

    #[test]
    fn filter_is_evaluated_once_per_branch_at_its_own_scope() {
        let hits = Arc::new(AtomicUsize::new(0));
        let asked = Arc::new(AtomicUsize::new(0));
        let mut reg = Registry::new();
        let session = reg.item("session", ItemKind::ComponentType);
        let unit = reg.item("unit", ItemKind::ComponentType);
        let gate = {
            let asked = Arc::clone(&asked);
            reg.register_filter("tally", session, move || {
                Arc::new(Tally(Arc::clone(&asked)))
            })
            .unwrap()
        };
        reg.register(Descriptor::adapter("each-unit", session, unit), || {
            SchedulableImpl::Adapter(Arc::new(FanOut(3)))
        })
        .unwrap();
        reg.register(
            Descriptor::runnable("leaf", unit).filter(gate),
            count_factory(&hits),
        )
        .unwrap();
        let registry = Arc::new(reg);

        let mut request = Request::new(Arc::clone(&registry));
        request.add_schedulables(["each-unit", "leaf"]).unwrap();
        let plan = request.build_plan(session).unwrap();

        let instance = ScheduleInstance::with_options(&plan, &registry, sequential()).unwrap();
        instance.process(Arc::new(Unit("s".into()))).unwrap();

        // The verdict is established once on the session and inherited
        // by all three unit branches, never re-asked below.
        assert_eq!(asked.load(Ordering::SeqCst), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(
            instance.statistics().event("filter:tally").unwrap().count,
            1
        );
    }

    #[test]
    fn skip_disabled_still_filters_per_leaf() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut reg = Registry::new();
        let session = reg.item("session", ItemKind::ComponentType);
        let unit = reg.item("unit", ItemKind::ComponentType);
        let gate = reg
            .register_filter("never", session, || Arc::new(Never))
            .unwrap();
        reg.register(Descriptor::adapter("each-unit", session, unit), || {
            SchedulableImpl::Adapter(Arc::new(FanOut(4)))
        })
        .unwrap();
        reg.register(
            Descriptor::runnable("leaf", unit).filter(gate),
            count_factory(&hits),
        )
        .unwrap();
        let registry = Arc::new(reg);

        let mut request = Request::new(Arc::clone(&registry));
        request.add_schedulables(["each-unit", "leaf"]).unwrap();
        let plan = request.build_plan(session).unwrap();

        let options = InstanceOptions {
            skip_adapters: false,
            ..sequential()
        };
        let instance = ScheduleInstance::with_options(&plan, &registry, options).unwrap();
        instance.process(Arc::new(Unit("s".into()))).unwrap();

        // The adapter runs, but the inherited verdict still blocks
        // every leaf.
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        let snap = instance.statistics();
        assert_eq!(snap.event("adapter:each-unit").unwrap().count, 1);
        assert_eq!(snap.event("runnable:leaf").unwrap().count, 0);
    }

    #[test]
    fn fail_fast_stops_after_first_failure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut reg = Registry::new();
        let session = reg.item("session", ItemKind::ComponentType);
        reg.register(Descriptor::runnable("boom", session), || {
            SchedulableImpl::Runnable(Arc::new(Fail))
        })
        .unwrap();
        reg.register(Descriptor::runnable("after", session), count_factory(&hits))
            .unwrap();
        let registry = Arc::new(reg);

        let mut request = Request::new(Arc::clone(&registry));
        request.add_schedulables(["boom", "after"]).unwrap();
        let plan = request.build_plan(session).unwrap();

        let instance = ScheduleInstance::with_options(&plan, &registry, sequential()).unwrap();
        let err = instance.process(Arc::new(Unit("s".into()))).unwrap_err();
        assert!(matches!(err, ProcessError::Runner { .. }));
        assert_eq!(err.schedulable(), Some("boom"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn collect_policy_drains_sibling_branches() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut reg = Registry::new();
        let session = reg.item("session", ItemKind::ComponentType);
        let unit = reg.item("unit", ItemKind::ComponentType);
        reg.register(Descriptor::adapter("each-unit", session, unit), || {
            SchedulableImpl::Adapter(Arc::new(FanOut(3)))
        })
        .unwrap();
        reg.register(Descriptor::runnable("boom", unit), || {
            SchedulableImpl::Runnable(Arc::new(Fail))
        })
        .unwrap();
        reg.register(Descriptor::runnable("leaf", unit), count_factory(&hits))
            .unwrap();
        let registry = Arc::new(reg);

        let mut request = Request::new(Arc::clone(&registry));
        request
            .add_schedulables(["each-unit", "boom", "leaf"])
            .unwrap();
        let plan = request.build_plan(session).unwrap();

        let options = InstanceOptions {
            policy: FailurePolicy::CollectAndAbort,
            ..sequential()
        };
        let instance = ScheduleInstance::with_options(&plan, &registry, options).unwrap();
        let err = instance.process(Arc::new(Unit("s".into()))).unwrap_err();

        // Each branch fails at "boom" and aborts before its own
        // "leaf", but every sibling still gets its turn.
        match err {
            ProcessError::Collected(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected collected failures, got {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
