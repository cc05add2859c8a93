//! Multi-entity commit transactions.
//!
//! Each operation here runs inside a single redb write transaction: either
//! every write lands or none does. redb serializes writers, so re-reading a
//! status inside the transaction and bailing on a mismatch is the
//! optimistic guarded-UPDATE of the design — validation runs unlocked and
//! a lost race surfaces as [`StateError::Conflict`].
//!
//! An early `return Err(..)` drops the uncommitted transaction, which redb
//! aborts; persisted state is left exactly as it was.

use redb::ReadableTable;
use tracing::{debug, info, warn};

use route_core::*;

use crate::error::{StateError, StateResult};
use crate::store::{from_bytes, key, map_err, tenant_prefix, to_bytes, StateStore};
use crate::tables::*;

/// Confirmation actor/note/name applied to the configuration inside the
/// commit transaction.
#[derive(Debug, Clone)]
pub struct ConfirmationStamp {
    pub confirmed_by: String,
    pub confirmation_note: Option<String>,
    pub plan_name: Option<String>,
    pub now: i64,
}

/// Outcome of a successful confirmation commit.
#[derive(Debug, Clone)]
pub struct ConfirmationCommit {
    /// Orders actually moved PENDING → ASSIGNED. May be lower than the
    /// pre-checked count when a status drifted at the last instant.
    pub orders_assigned: u32,
    pub configuration: PlanConfiguration,
}

/// Outcome of a stop transition commit.
#[derive(Debug, Clone, Copy)]
pub struct StopCommit {
    pub history_seq: u32,
    /// Owning order moved ASSIGNED → IN_PROGRESS in this commit.
    pub order_started: bool,
    /// Owning order moved to COMPLETED in this commit.
    pub order_completed: bool,
}

/// Outcome of a cascading plan deletion.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanDeletion {
    pub jobs_deleted: u32,
    pub stops_deleted: u32,
    pub orders_reverted: u32,
}

impl StateStore {
    /// Atomically confirm a plan: configuration DRAFT → CONFIRMED (guarded),
    /// still-PENDING orders → ASSIGNED (drift tolerated, logged), bulk stop
    /// insert, write-once metrics insert.
    pub fn commit_confirmation(
        &self,
        tenant: &str,
        config_id: &str,
        stamp: &ConfirmationStamp,
        order_ids: &[OrderId],
        stops: &[RouteStop],
        metrics: &PlanMetrics,
    ) -> StateResult<ConfirmationCommit> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let configuration;
        let mut assigned = 0u32;
        {
            // Guarded configuration update. Anything but DRAFT means a
            // concurrent confirmation won the race (or the caller raced a
            // delete); abort with no writes.
            let mut configs = txn.open_table(CONFIGURATIONS).map_err(map_err!(Table))?;
            let ckey = key(tenant, config_id);
            let raw = configs
                .get(ckey.as_str())
                .map_err(map_err!(Read))?
                .map(|g| g.value().to_vec())
                .ok_or_else(|| StateError::NotFound(format!("configuration {config_id}")))?;
            let mut config: PlanConfiguration = from_bytes(&raw)?;
            if config.status != ConfigStatus::Draft {
                return Err(StateError::Conflict(format!(
                    "configuration {config_id} is {:?}, not DRAFT",
                    config.status
                )));
            }
            config.status = ConfigStatus::Confirmed;
            config.confirmed_at = Some(stamp.now);
            config.confirmed_by = Some(stamp.confirmed_by.clone());
            config.confirmation_note = stamp.confirmation_note.clone();
            if stamp.plan_name.is_some() {
                config.plan_name = stamp.plan_name.clone();
            }
            config.updated_at = stamp.now;
            let bytes = to_bytes(&config)?;
            configs
                .insert(ckey.as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;
            configuration = config;

            // Orders: only those still PENDING move. A mismatch with the
            // pre-checked set is tolerated — an external status change can
            // land between validation and commit.
            let mut orders = txn.open_table(ORDERS).map_err(map_err!(Table))?;
            for order_id in order_ids {
                let okey = key(tenant, order_id);
                let raw = orders
                    .get(okey.as_str())
                    .map_err(map_err!(Read))?
                    .map(|g| g.value().to_vec());
                match raw {
                    Some(bytes) => {
                        let mut order: Order = from_bytes(&bytes)?;
                        if order.status == OrderStatus::Pending {
                            order.status = OrderStatus::Assigned;
                            order.updated_at = stamp.now;
                            let bytes = to_bytes(&order)?;
                            orders
                                .insert(okey.as_str(), bytes.as_slice())
                                .map_err(map_err!(Write))?;
                            assigned += 1;
                        } else {
                            warn!(
                                %order_id,
                                status = ?order.status,
                                "order drifted between pre-check and commit, skipping"
                            );
                        }
                    }
                    None => {
                        warn!(%order_id, "order vanished between pre-check and commit, skipping");
                    }
                }
            }

            let mut stop_table = txn.open_table(ROUTE_STOPS).map_err(map_err!(Table))?;
            for stop in stops {
                let bytes = to_bytes(stop)?;
                stop_table
                    .insert(key(tenant, &stop.id).as_str(), bytes.as_slice())
                    .map_err(map_err!(Write))?;
            }

            // Metrics are write-once per job.
            let mut metric_table = txn.open_table(PLAN_METRICS).map_err(map_err!(Table))?;
            let mkey = key(tenant, &metrics.job_id);
            let exists = metric_table
                .get(mkey.as_str())
                .map_err(map_err!(Read))?
                .is_some();
            if exists {
                warn!(job_id = %metrics.job_id, "plan metrics already present, leaving untouched");
            } else {
                let bytes = to_bytes(metrics)?;
                metric_table
                    .insert(mkey.as_str(), bytes.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;

        info!(
            %tenant,
            %config_id,
            orders_assigned = assigned,
            stops_created = stops.len(),
            "plan confirmed"
        );
        Ok(ConfirmationCommit {
            orders_assigned: assigned,
            configuration,
        })
    }

    /// Atomically apply one stop transition: stop update, history append
    /// (sequence assigned here), and the idempotent order cascade.
    ///
    /// Cascade rules: the first stop leaving PENDING moves an ASSIGNED
    /// order to IN_PROGRESS; when every stop of the order is COMPLETED the
    /// order becomes COMPLETED (once — an already-COMPLETED order is left
    /// alone). A FAILED or SKIPPED stop never changes the order.
    pub fn commit_stop_transition(
        &self,
        tenant: &str,
        stop: &RouteStop,
        history: &RouteStopHistory,
    ) -> StateResult<StopCommit> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut commit = StopCommit {
            history_seq: 0,
            order_started: false,
            order_completed: false,
        };
        {
            let mut stop_table = txn.open_table(ROUTE_STOPS).map_err(map_err!(Table))?;
            let bytes = to_bytes(stop)?;
            stop_table
                .insert(key(tenant, &stop.id).as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;

            // Append history with the next per-stop sequence.
            let mut history_table = txn.open_table(STOP_HISTORY).map_err(map_err!(Table))?;
            let prefix = format!("{tenant}/{}:", stop.id);
            let mut seq = 0u32;
            for entry in history_table.iter().map_err(map_err!(Read))? {
                let (k, _) = entry.map_err(map_err!(Read))?;
                if k.value().starts_with(&prefix) {
                    seq += 1;
                }
            }
            let mut entry = history.clone();
            entry.seq = seq;
            commit.history_seq = seq;
            let bytes = to_bytes(&entry)?;
            history_table
                .insert(format!("{prefix}{seq:06}").as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;

            // Order cascade.
            let mut orders = txn.open_table(ORDERS).map_err(map_err!(Table))?;
            let okey = key(tenant, &stop.order_id);
            let raw = orders
                .get(okey.as_str())
                .map_err(map_err!(Read))?
                .map(|g| g.value().to_vec());
            if let Some(bytes) = raw {
                let mut order: Order = from_bytes(&bytes)?;
                match stop.status {
                    StopStatus::InProgress if order.status == OrderStatus::Assigned => {
                        order.status = OrderStatus::InProgress;
                        order.updated_at = stop.updated_at;
                        let bytes = to_bytes(&order)?;
                        orders
                            .insert(okey.as_str(), bytes.as_slice())
                            .map_err(map_err!(Write))?;
                        commit.order_started = true;
                    }
                    StopStatus::Completed => {
                        // All stops of the order done? The updated stop is
                        // already in the table, so the scan sees it.
                        let tprefix = tenant_prefix(tenant);
                        let mut all_completed = true;
                        for entry in stop_table.iter().map_err(map_err!(Read))? {
                            let (k, v) = entry.map_err(map_err!(Read))?;
                            if !k.value().starts_with(&tprefix) {
                                continue;
                            }
                            let other: RouteStop = from_bytes(v.value())?;
                            if other.order_id == stop.order_id
                                && other.status != StopStatus::Completed
                            {
                                all_completed = false;
                                break;
                            }
                        }
                        let eligible = matches!(
                            order.status,
                            OrderStatus::Assigned | OrderStatus::InProgress
                        );
                        if all_completed && eligible {
                            order.status = OrderStatus::Completed;
                            order.updated_at = stop.updated_at;
                            let bytes = to_bytes(&order)?;
                            orders
                                .insert(okey.as_str(), bytes.as_slice())
                                .map_err(map_err!(Write))?;
                            commit.order_completed = true;
                        }
                    }
                    // FAILED and SKIPPED leave the order to the dispatcher.
                    _ => {}
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(
            stop_id = %stop.id,
            status = %stop.status,
            order_started = commit.order_started,
            order_completed = commit.order_completed,
            "stop transition committed"
        );
        Ok(commit)
    }

    /// Atomically persist a reassignment: rewritten job result, the
    /// append-only record, and any route stop rows moved to the new
    /// driver/vehicle.
    pub fn commit_reassignment(
        &self,
        tenant: &str,
        job: &OptimizationJob,
        record: &ReassignmentRecord,
        stop_updates: &[RouteStop],
    ) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut jobs = txn.open_table(JOBS).map_err(map_err!(Table))?;
            let bytes = to_bytes(job)?;
            jobs.insert(key(tenant, &job.id).as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;

            let mut records = txn.open_table(REASSIGNMENTS).map_err(map_err!(Table))?;
            let bytes = to_bytes(record)?;
            records
                .insert(key(tenant, &record.id).as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;

            let mut stop_table = txn.open_table(ROUTE_STOPS).map_err(map_err!(Table))?;
            for stop in stop_updates {
                let bytes = to_bytes(stop)?;
                stop_table
                    .insert(key(tenant, &stop.id).as_str(), bytes.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;

        info!(
            %tenant,
            job_id = %job.id,
            absent_driver = ?record.absent_driver_id,
            stops_moved = stop_updates.len(),
            "reassignment committed"
        );
        Ok(())
    }

    /// Atomically delete a plan configuration and everything hanging off
    /// it: jobs, their metrics, stops and stop history. Orders the plan had
    /// ASSIGNED revert to PENDING.
    pub fn commit_plan_deletion(&self, tenant: &str, config_id: &str) -> StateResult<PlanDeletion> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut deletion = PlanDeletion::default();
        {
            let mut configs = txn.open_table(CONFIGURATIONS).map_err(map_err!(Table))?;
            let removed = configs
                .remove(key(tenant, config_id).as_str())
                .map_err(map_err!(Write))?
                .is_some();
            if !removed {
                return Err(StateError::NotFound(format!("configuration {config_id}")));
            }

            let tprefix = tenant_prefix(tenant);

            // Jobs of this configuration.
            let mut jobs = txn.open_table(JOBS).map_err(map_err!(Table))?;
            let mut job_keys = Vec::new();
            let mut job_ids = Vec::new();
            for entry in jobs.iter().map_err(map_err!(Read))? {
                let (k, v) = entry.map_err(map_err!(Read))?;
                if !k.value().starts_with(&tprefix) {
                    continue;
                }
                let job: OptimizationJob = from_bytes(v.value())?;
                if job.config_id == config_id {
                    job_keys.push(k.value().to_string());
                    job_ids.push(job.id);
                }
            }
            for k in &job_keys {
                jobs.remove(k.as_str()).map_err(map_err!(Write))?;
            }
            deletion.jobs_deleted = job_keys.len() as u32;

            let mut metric_table = txn.open_table(PLAN_METRICS).map_err(map_err!(Table))?;
            for job_id in &job_ids {
                metric_table
                    .remove(key(tenant, job_id).as_str())
                    .map_err(map_err!(Write))?;
            }

            // Stops of those jobs (collect first, then remove).
            let mut stop_table = txn.open_table(ROUTE_STOPS).map_err(map_err!(Table))?;
            let mut stop_keys = Vec::new();
            let mut stop_ids = Vec::new();
            let mut order_ids = Vec::new();
            for entry in stop_table.iter().map_err(map_err!(Read))? {
                let (k, v) = entry.map_err(map_err!(Read))?;
                if !k.value().starts_with(&tprefix) {
                    continue;
                }
                let stop: RouteStop = from_bytes(v.value())?;
                if job_ids.contains(&stop.job_id) {
                    stop_keys.push(k.value().to_string());
                    stop_ids.push(stop.id);
                    if !order_ids.contains(&stop.order_id) {
                        order_ids.push(stop.order_id);
                    }
                }
            }
            for k in &stop_keys {
                stop_table.remove(k.as_str()).map_err(map_err!(Write))?;
            }
            deletion.stops_deleted = stop_keys.len() as u32;

            // History of the removed stops.
            let mut history_table = txn.open_table(STOP_HISTORY).map_err(map_err!(Table))?;
            let mut history_keys = Vec::new();
            for entry in history_table.iter().map_err(map_err!(Read))? {
                let (k, _) = entry.map_err(map_err!(Read))?;
                let kv = k.value();
                if stop_ids
                    .iter()
                    .any(|sid| kv.starts_with(&format!("{tenant}/{sid}:")))
                {
                    history_keys.push(kv.to_string());
                }
            }
            for k in &history_keys {
                history_table.remove(k.as_str()).map_err(map_err!(Write))?;
            }

            // Revert orders this plan had assigned.
            let mut orders = txn.open_table(ORDERS).map_err(map_err!(Table))?;
            for order_id in &order_ids {
                let okey = key(tenant, order_id);
                let raw = orders
                    .get(okey.as_str())
                    .map_err(map_err!(Read))?
                    .map(|g| g.value().to_vec());
                if let Some(bytes) = raw {
                    let mut order: Order = from_bytes(&bytes)?;
                    if order.status == OrderStatus::Assigned {
                        order.status = OrderStatus::Pending;
                        let bytes = to_bytes(&order)?;
                        orders
                            .insert(okey.as_str(), bytes.as_slice())
                            .map_err(map_err!(Write))?;
                        deletion.orders_reverted += 1;
                    }
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;

        info!(
            %tenant,
            %config_id,
            jobs = deletion.jobs_deleted,
            stops = deletion.stops_deleted,
            orders_reverted = deletion.orders_reverted,
            "plan deleted"
        );
        Ok(deletion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn stamp(now: i64) -> ConfirmationStamp {
        ConfirmationStamp {
            confirmed_by: "dispatcher-1".into(),
            confirmation_note: Some("morning wave".into()),
            plan_name: Some("Monday".into()),
            now,
        }
    }

    fn seeded_store() -> StateStore {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_configuration(&test_configuration("acme", "cfg-1", ConfigStatus::Draft))
            .unwrap();
        for i in 1..=3 {
            store
                .put_order(&test_order("acme", &format!("ord-{i}"), OrderStatus::Pending))
                .unwrap();
        }
        store
    }

    #[test]
    fn confirmation_commits_all_entities() {
        let store = seeded_store();
        let stops = vec![
            test_stop("acme", "stop-1", "job-1", "route-1", "drv-1", "ord-1", 1),
            test_stop("acme", "stop-2", "job-1", "route-1", "drv-1", "ord-2", 2),
            test_stop("acme", "stop-3", "job-1", "route-1", "drv-1", "ord-3", 3),
        ];
        let order_ids: Vec<String> = vec!["ord-1".into(), "ord-2".into(), "ord-3".into()];

        let commit = store
            .commit_confirmation(
                "acme",
                "cfg-1",
                &stamp(2000),
                &order_ids,
                &stops,
                &test_metrics("acme", "job-1"),
            )
            .unwrap();

        assert_eq!(commit.orders_assigned, 3);
        assert_eq!(commit.configuration.status, ConfigStatus::Confirmed);
        assert_eq!(commit.configuration.confirmed_at, Some(2000));
        assert_eq!(commit.configuration.plan_name.as_deref(), Some("Monday"));

        for i in 1..=3 {
            let order = store.get_order("acme", &format!("ord-{i}")).unwrap().unwrap();
            assert_eq!(order.status, OrderStatus::Assigned);
        }
        assert_eq!(store.list_stops_for_job("acme", "job-1").unwrap().len(), 3);
        assert!(store.get_plan_metrics("acme", "job-1").unwrap().is_some());
    }

    #[test]
    fn second_confirmation_conflicts_with_zero_mutations() {
        let store = seeded_store();
        let order_ids: Vec<String> = vec!["ord-1".into()];
        let stops = vec![test_stop("acme", "stop-1", "job-1", "route-1", "drv-1", "ord-1", 1)];
        store
            .commit_confirmation("acme", "cfg-1", &stamp(2000), &order_ids, &stops, &test_metrics("acme", "job-1"))
            .unwrap();

        let again = store.commit_confirmation(
            "acme",
            "cfg-1",
            &stamp(3000),
            &order_ids,
            &[test_stop("acme", "stop-9", "job-2", "route-9", "drv-1", "ord-1", 1)],
            &test_metrics("acme", "job-2"),
        );
        assert!(matches!(again, Err(StateError::Conflict(_))));

        // Nothing from the losing attempt persisted.
        assert!(store.get_stop("acme", "stop-9").unwrap().is_none());
        assert!(store.get_plan_metrics("acme", "job-2").unwrap().is_none());
        let config = store.get_configuration("acme", "cfg-1").unwrap().unwrap();
        assert_eq!(config.confirmed_at, Some(2000));
    }

    #[test]
    fn missing_configuration_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let result = store.commit_confirmation(
            "acme",
            "cfg-ghost",
            &stamp(2000),
            &[],
            &[],
            &test_metrics("acme", "job-1"),
        );
        assert!(matches!(result, Err(StateError::NotFound(_))));
    }

    #[test]
    fn drifted_order_is_skipped_not_fatal() {
        let store = seeded_store();
        // ord-2 drifts to CANCELLED after the (simulated) pre-check.
        store
            .put_order(&test_order("acme", "ord-2", OrderStatus::Cancelled))
            .unwrap();
        let order_ids: Vec<String> = vec!["ord-1".into(), "ord-2".into()];
        let stops = vec![test_stop("acme", "stop-1", "job-1", "route-1", "drv-1", "ord-1", 1)];

        let commit = store
            .commit_confirmation("acme", "cfg-1", &stamp(2000), &order_ids, &stops, &test_metrics("acme", "job-1"))
            .unwrap();

        assert_eq!(commit.orders_assigned, 1);
        let drifted = store.get_order("acme", "ord-2").unwrap().unwrap();
        assert_eq!(drifted.status, OrderStatus::Cancelled);
    }

    #[test]
    fn stop_transition_appends_history_with_sequence() {
        let store = seeded_store();
        let mut stop = test_stop("acme", "stop-1", "job-1", "route-1", "drv-1", "ord-1", 1);
        seed_stops(&store, std::slice::from_ref(&stop));

        stop.status = StopStatus::InProgress;
        let c1 = store
            .commit_stop_transition(
                "acme",
                &stop,
                &test_history("acme", "stop-1", StopStatus::Pending, StopStatus::InProgress),
            )
            .unwrap();
        stop.status = StopStatus::Completed;
        let c2 = store
            .commit_stop_transition(
                "acme",
                &stop,
                &test_history("acme", "stop-1", StopStatus::InProgress, StopStatus::Completed),
            )
            .unwrap();

        assert_eq!(c1.history_seq, 0);
        assert_eq!(c2.history_seq, 1);
        let history = store.list_stop_history("acme", "stop-1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].new_status, StopStatus::InProgress);
        assert_eq!(history[1].new_status, StopStatus::Completed);
    }

    #[test]
    fn first_in_progress_stop_starts_the_order() {
        let store = seeded_store();
        store
            .put_order(&test_order("acme", "ord-1", OrderStatus::Assigned))
            .unwrap();
        let mut stop = test_stop("acme", "stop-1", "job-1", "route-1", "drv-1", "ord-1", 1);
        seed_stops(&store, std::slice::from_ref(&stop));

        stop.status = StopStatus::InProgress;
        let commit = store
            .commit_stop_transition(
                "acme",
                &stop,
                &test_history("acme", "stop-1", StopStatus::Pending, StopStatus::InProgress),
            )
            .unwrap();

        assert!(commit.order_started);
        let order = store.get_order("acme", "ord-1").unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::InProgress);
    }

    #[test]
    fn order_completes_when_last_stop_completes_exactly_once() {
        let store = seeded_store();
        store
            .put_order(&test_order("acme", "ord-1", OrderStatus::InProgress))
            .unwrap();
        let mut s1 = test_stop("acme", "stop-1", "job-1", "route-1", "drv-1", "ord-1", 1);
        let mut s2 = test_stop("acme", "stop-2", "job-1", "route-2", "drv-2", "ord-1", 1);
        seed_stops(&store, &[s1.clone(), s2.clone()]);

        s1.status = StopStatus::Completed;
        let c1 = store
            .commit_stop_transition(
                "acme",
                &s1,
                &test_history("acme", "stop-1", StopStatus::InProgress, StopStatus::Completed),
            )
            .unwrap();
        assert!(!c1.order_completed, "one stop still open");

        s2.status = StopStatus::Completed;
        let c2 = store
            .commit_stop_transition(
                "acme",
                &s2,
                &test_history("acme", "stop-2", StopStatus::InProgress, StopStatus::Completed),
            )
            .unwrap();
        assert!(c2.order_completed);
        assert_eq!(
            store.get_order("acme", "ord-1").unwrap().unwrap().status,
            OrderStatus::Completed
        );

        // Repeating the completion check mutates nothing further.
        let c3 = store
            .commit_stop_transition(
                "acme",
                &s2,
                &test_history("acme", "stop-2", StopStatus::Completed, StopStatus::Completed),
            )
            .unwrap();
        assert!(!c3.order_completed);
    }

    #[test]
    fn failed_stop_leaves_order_untouched() {
        let store = seeded_store();
        store
            .put_order(&test_order("acme", "ord-1", OrderStatus::InProgress))
            .unwrap();
        let mut stop = test_stop("acme", "stop-1", "job-1", "route-1", "drv-1", "ord-1", 1);
        seed_stops(&store, std::slice::from_ref(&stop));

        stop.status = StopStatus::Failed;
        stop.failure_reason = Some("recipient absent".into());
        let commit = store
            .commit_stop_transition(
                "acme",
                &stop,
                &test_history("acme", "stop-1", StopStatus::InProgress, StopStatus::Failed),
            )
            .unwrap();

        assert!(!commit.order_completed);
        assert_eq!(
            store.get_order("acme", "ord-1").unwrap().unwrap().status,
            OrderStatus::InProgress
        );
    }

    #[test]
    fn reassignment_commit_persists_everything() {
        let store = seeded_store();
        let job = test_job("acme", "job-1", "cfg-1", Some(empty_result()));
        store.put_job(&job).unwrap();
        let mut moved = test_stop("acme", "stop-1", "job-1", "route-2", "drv-2", "ord-1", 1);
        moved.vehicle_id = "veh-2".into();
        let record = ReassignmentRecord {
            id: "ra-1".into(),
            tenant_id: "acme".into(),
            job_id: "job-1".into(),
            absent_driver_id: Some("drv-1".into()),
            affected_route_ids: vec!["route-1".into(), "route-2".into()],
            affected_vehicle_ids: vec!["veh-2".into()],
            reassignments: vec![StopReassignment {
                driver_id: "drv-2".into(),
                stop_ids: vec!["stop-1".into()],
            }],
            reason: Some("driver sick".into()),
            executed_by: "dispatcher-1".into(),
            executed_at: 5000,
        };

        store
            .commit_reassignment("acme", &job, &record, &[moved.clone()])
            .unwrap();

        assert_eq!(store.list_reassignments("acme").unwrap().len(), 1);
        let stored = store.get_stop("acme", "stop-1").unwrap().unwrap();
        assert_eq!(stored.driver_id, "drv-2");
        assert_eq!(stored.vehicle_id, "veh-2");
    }

    #[test]
    fn plan_deletion_reverts_assigned_orders() {
        let store = seeded_store();
        let order_ids: Vec<String> = vec!["ord-1".into(), "ord-2".into()];
        let stops = vec![
            test_stop("acme", "stop-1", "job-1", "route-1", "drv-1", "ord-1", 1),
            test_stop("acme", "stop-2", "job-1", "route-1", "drv-1", "ord-2", 2),
        ];
        store
            .commit_confirmation("acme", "cfg-1", &stamp(2000), &order_ids, &stops, &test_metrics("acme", "job-1"))
            .unwrap();
        store
            .put_job(&test_job("acme", "job-1", "cfg-1", Some(empty_result())))
            .unwrap();

        let deletion = store.commit_plan_deletion("acme", "cfg-1").unwrap();

        assert_eq!(deletion.jobs_deleted, 1);
        assert_eq!(deletion.stops_deleted, 2);
        assert_eq!(deletion.orders_reverted, 2);
        assert!(store.get_configuration("acme", "cfg-1").unwrap().is_none());
        assert!(store.get_plan_metrics("acme", "job-1").unwrap().is_none());
        assert_eq!(
            store.get_order("acme", "ord-1").unwrap().unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn deleting_unknown_plan_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(matches!(
            store.commit_plan_deletion("acme", "ghost"),
            Err(StateError::NotFound(_))
        ));
    }
}
