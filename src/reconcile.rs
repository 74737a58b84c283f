//! Two-way list reconciliation
//!
//! One run reads both stores and the stored watermark, picks which side is
//! authoritative, replays that side onto the other and records the new
//! watermark. The watermark is written last, and only when every mutation
//! succeeded, so an aborted run is simply redone by the next one.
//!
//! ```text
//!  read remote ─┐
//!               ├─▶ decide ─▶ NoOp ───────────────────────────────▶ done
//!  read local ──┘      │
//!                      ├─▶ PushToLocal  ─┐
//!                      └─▶ PushToRemote ─┴─▶ re-read ─▶ save watermark
//! ```
//!
//! Runs must not overlap; scheduling them is the caller's job.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{ListItem, ListSnapshot, SyncWatermark};
use crate::state::WatermarkStore;
use crate::store::{ListReader, LocalList, RemoteList};

/// Direction chosen for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Neither side changed since the last sync
    NoOp,
    /// Remote is newer: replace the local list with it
    PushToLocal,
    /// Local is newer or tied: rebuild the remote list from it
    PushToRemote,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::NoOp => f.write_str("nothing to sync"),
            SyncOutcome::PushToLocal => f.write_str("remote -> local"),
            SyncOutcome::PushToRemote => f.write_str("local -> remote"),
        }
    }
}

/// Pick the direction of a run.
///
/// Local wins ties: the remote side is only authoritative when it was
/// modified strictly after the local one.
pub fn decide(remote: &ListSnapshot, local: &ListSnapshot, watermark: &SyncWatermark) -> SyncOutcome {
    if remote.modified_at == watermark.remote_modified_at
        && local.modified_at == watermark.local_modified_at
    {
        SyncOutcome::NoOp
    } else if remote.modified_at > local.modified_at {
        SyncOutcome::PushToLocal
    } else {
        SyncOutcome::PushToRemote
    }
}

/// What a run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Items created on the receiving side
    pub added: usize,
    /// Items deleted from the remote list
    pub deleted: usize,
    /// Remote deletes that found the item already gone
    pub missing: usize,
    /// Watermark in effect after the run
    pub watermark: SyncWatermark,
    pub dry_run: bool,
}

impl SyncReport {
    fn unchanged(outcome: SyncOutcome, watermark: SyncWatermark, dry_run: bool) -> Self {
        Self {
            outcome,
            added: 0,
            deleted: 0,
            missing: 0,
            watermark,
            dry_run,
        }
    }
}

/// Result of a one-way import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub missing: usize,
}

pub struct Reconciler<'a> {
    remote: &'a mut dyn RemoteList,
    local: &'a mut dyn LocalList,
    watermarks: &'a mut dyn WatermarkStore,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        remote: &'a mut dyn RemoteList,
        local: &'a mut dyn LocalList,
        watermarks: &'a mut dyn WatermarkStore,
    ) -> Self {
        Self {
            remote,
            local,
            watermarks,
            dry_run: false,
        }
    }

    /// Decide only; no store or watermark is touched.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Perform one reconciliation run.
    pub async fn run(&mut self) -> Result<SyncReport> {
        let watermark = self.watermarks.load()?;
        let (remote, local) = tokio::try_join!(self.remote.read(), self.local.read())?;

        let outcome = decide(&remote, &local, &watermark);
        info!(
            %outcome,
            remote_modified = %remote.modified_at,
            local_modified = %local.modified_at,
            "Decided sync direction"
        );

        if outcome == SyncOutcome::NoOp || self.dry_run {
            return Ok(SyncReport::unchanged(outcome, watermark, self.dry_run));
        }

        let mut report = SyncReport::unchanged(outcome, watermark, false);
        match outcome {
            SyncOutcome::PushToLocal => self.push_to_local(&remote, &mut report).await?,
            SyncOutcome::PushToRemote => self.push_to_remote(&remote, &local, &mut report).await?,
            SyncOutcome::NoOp => {}
        }

        let (remote, local) = tokio::try_join!(self.remote.read(), self.local.read())?;
        report.watermark = SyncWatermark::observed(&remote, &local);
        self.watermarks.save(&report.watermark)?;
        info!(
            remote = %report.watermark.remote_modified_at,
            local = %report.watermark.local_modified_at,
            "Saved watermark"
        );

        Ok(report)
    }

    async fn push_to_local(&mut self, remote: &ListSnapshot, report: &mut SyncReport) -> Result<()> {
        debug!("Clearing local list");
        self.local.clear_all().await?;

        // Checked remote items are consumed, not copied
        for item in remote.checked() {
            self.delete_remote(item, report).await?;
        }

        for item in remote.unchecked() {
            debug!(text = %item.text, "Adding to local list");
            self.local.add_item(&item.text).await?;
            report.added += 1;
        }

        self.remote.flush().await
    }

    async fn push_to_remote(
        &mut self,
        remote: &ListSnapshot,
        local: &ListSnapshot,
        report: &mut SyncReport,
    ) -> Result<()> {
        for item in &remote.items {
            self.delete_remote(item, report).await?;
        }

        debug!("Clearing completed local items");
        self.local.clear_completed().await?;

        for item in local.unchecked() {
            debug!(text = %item.text, "Adding to remote list");
            self.remote.add_item(&item.text).await?;
            report.added += 1;
        }

        self.remote.flush().await
    }

    async fn delete_remote(&mut self, item: &ListItem, report: &mut SyncReport) -> Result<()> {
        match self.remote.delete_item(item).await {
            Ok(()) => {
                report.deleted += 1;
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(text = %item.text, "Item already gone from remote list");
                report.missing += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Move every unchecked remote item into the local list.
///
/// Each item is added locally before it is deleted remotely, so a failure
/// can duplicate an item on the next attempt but never drop one.
pub async fn import_remote(
    remote: &mut dyn RemoteList,
    local: &mut dyn LocalList,
) -> Result<ImportReport> {
    let snapshot = remote.read().await?;
    let mut report = ImportReport::default();

    for item in snapshot.unchecked() {
        debug!(text = %item.text, "Importing item");
        local.add_item(&item.text).await?;
        match remote.delete_item(item).await {
            Ok(()) => report.imported += 1,
            Err(e) if e.is_not_found() => {
                warn!(text = %item.text, "Item already gone from remote list");
                report.missing += 1;
            }
            Err(e) => return Err(e),
        }
    }

    remote.flush().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::model::StoreKind;
    use crate::store::memory::{at, MemoryLocal, MemoryRemote, MemoryWatermarkStore};

    fn snap(secs: i64) -> ListSnapshot {
        ListSnapshot::new(Vec::new(), at(secs))
    }

    async fn run(
        remote: &mut MemoryRemote,
        local: &mut MemoryLocal,
        watermarks: &mut MemoryWatermarkStore,
    ) -> Result<SyncReport> {
        Reconciler::new(remote, local, watermarks).run().await
    }

    #[test]
    fn test_decide_noop_when_both_match_watermark() {
        let wm = SyncWatermark::new(at(10), at(20));
        assert_eq!(decide(&snap(10), &snap(20), &wm), SyncOutcome::NoOp);
    }

    #[test]
    fn test_decide_remote_strictly_newer_pushes_to_local() {
        let wm = SyncWatermark::new(at(5), at(5));
        assert_eq!(decide(&snap(10), &snap(5), &wm), SyncOutcome::PushToLocal);
    }

    #[test]
    fn test_decide_local_newer_pushes_to_remote() {
        let wm = SyncWatermark::new(at(5), at(5));
        assert_eq!(decide(&snap(5), &snap(20), &wm), SyncOutcome::PushToRemote);
    }

    #[test]
    fn test_decide_tie_goes_to_local() {
        let wm = SyncWatermark::new(at(1), at(1));
        assert_eq!(decide(&snap(7), &snap(7), &wm), SyncOutcome::PushToRemote);
    }

    #[test]
    fn test_decide_compares_sides_not_watermark() {
        // Only local changed since the watermark, but remote is still newer
        let wm = SyncWatermark::new(at(30), at(5));
        assert_eq!(decide(&snap(30), &snap(10), &wm), SyncOutcome::PushToLocal);
    }

    #[test]
    fn test_decide_empty_lists_at_epoch_is_noop() {
        let wm = SyncWatermark::default();
        assert_eq!(decide(&snap(0), &snap(0), &wm), SyncOutcome::NoOp);
    }

    #[tokio::test]
    async fn test_noop_performs_no_mutations() {
        let mut remote = MemoryRemote::new(vec![ListItem::unchecked("milk")], at(10));
        let mut local = MemoryLocal::new(vec![ListItem::checked("tea")], at(20));
        let mut watermarks = MemoryWatermarkStore::with(SyncWatermark::new(at(10), at(20)));

        let report = run(&mut remote, &mut local, &mut watermarks).await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::NoOp);
        assert!(remote.mutations().is_empty());
        assert!(local.mutations().is_empty());
        assert_eq!(remote.flushes(), 0);
        assert_eq!(watermarks.saves(), 0);
        assert_eq!(watermarks.stored(), Some(SyncWatermark::new(at(10), at(20))));
    }

    #[tokio::test]
    async fn test_push_to_local_example() {
        let mut remote = MemoryRemote::new(
            vec![ListItem::unchecked("milk"), ListItem::checked("eggs")],
            at(10),
        );
        let mut local = MemoryLocal::new(Vec::new(), at(5));
        let mut watermarks = MemoryWatermarkStore::with(SyncWatermark::new(at(5), at(5)));

        let report = run(&mut remote, &mut local, &mut watermarks).await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::PushToLocal);
        assert_eq!(local.items(), &[ListItem::unchecked("milk")]);
        assert!(remote.items().iter().all(|item| !item.done));
        assert_eq!(remote.items(), &[ListItem::unchecked("milk")]);
        assert_eq!(remote.flushes(), 1);
        assert_eq!((report.added, report.deleted), (1, 1));
        assert_eq!(
            watermarks.stored(),
            Some(SyncWatermark::new(remote.modified_at(), local.modified_at()))
        );
    }

    #[tokio::test]
    async fn test_push_to_local_replaces_local_content() {
        let mut remote = MemoryRemote::new(
            vec![ListItem::unchecked("apples"), ListItem::unchecked("pears")],
            at(50),
        );
        let mut local = MemoryLocal::new(
            vec![ListItem::unchecked("stale"), ListItem::checked("done")],
            at(40),
        );
        let mut watermarks = MemoryWatermarkStore::with(SyncWatermark::new(at(40), at(40)));

        run(&mut remote, &mut local, &mut watermarks).await.unwrap();

        let texts: Vec<_> = local.items().iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["apples", "pears"]);
        assert!(local.items().iter().all(|i| !i.done));
    }

    #[tokio::test]
    async fn test_push_to_remote_example() {
        let mut remote = MemoryRemote::new(Vec::new(), at(5));
        let mut local = MemoryLocal::new(
            vec![ListItem::unchecked("bread"), ListItem::checked("soap")],
            at(20),
        );
        let mut watermarks = MemoryWatermarkStore::with(SyncWatermark::new(at(5), at(5)));

        let report = run(&mut remote, &mut local, &mut watermarks).await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::PushToRemote);
        assert_eq!(local.items(), &[ListItem::unchecked("bread")]);
        assert_eq!(remote.items(), &[ListItem::unchecked("bread")]);
        assert!(!remote.is_dirty());
    }

    #[tokio::test]
    async fn test_push_to_remote_rebuilds_in_local_order() {
        let mut remote = MemoryRemote::new(
            vec![ListItem::unchecked("old"), ListItem::checked("older")],
            at(5),
        );
        let mut local = MemoryLocal::new(
            vec![
                ListItem::unchecked("c"),
                ListItem::checked("x"),
                ListItem::unchecked("a"),
                ListItem::unchecked("b"),
            ],
            at(9),
        );
        let mut watermarks = MemoryWatermarkStore::default();

        let report = run(&mut remote, &mut local, &mut watermarks).await.unwrap();

        assert_eq!(report.deleted, 2);
        let texts: Vec<_> = remote.items().iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "a", "b"]);
        assert!(remote.items().iter().all(|i| !i.done));
    }

    #[tokio::test]
    async fn test_tie_pushes_to_remote() {
        let mut remote = MemoryRemote::new(vec![ListItem::unchecked("remote-only")], at(7));
        let mut local = MemoryLocal::new(vec![ListItem::unchecked("local-only")], at(7));
        let mut watermarks = MemoryWatermarkStore::with(SyncWatermark::new(at(1), at(1)));

        let report = run(&mut remote, &mut local, &mut watermarks).await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::PushToRemote);
        assert_eq!(remote.items(), &[ListItem::unchecked("local-only")]);
    }

    #[tokio::test]
    async fn test_rerun_after_push_is_noop() {
        let mut remote = MemoryRemote::new(vec![ListItem::unchecked("milk")], at(10));
        let mut local = MemoryLocal::new(Vec::new(), at(5));
        let mut watermarks = MemoryWatermarkStore::default();

        let first = run(&mut remote, &mut local, &mut watermarks).await.unwrap();
        assert_eq!(first.outcome, SyncOutcome::PushToLocal);

        let second = run(&mut remote, &mut local, &mut watermarks).await.unwrap();
        assert_eq!(second.outcome, SyncOutcome::NoOp);
        assert_eq!(watermarks.saves(), 1);
    }

    #[tokio::test]
    async fn test_first_run_always_syncs() {
        let mut remote = MemoryRemote::new(Vec::new(), at(3));
        let mut local = MemoryLocal::new(vec![ListItem::unchecked("rice")], at(2));
        let mut watermarks = MemoryWatermarkStore::default();

        let report = run(&mut remote, &mut local, &mut watermarks).await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::PushToLocal);
        assert_eq!(watermarks.saves(), 1);
    }

    #[tokio::test]
    async fn test_mutation_failure_keeps_watermark() {
        let start = SyncWatermark::new(at(5), at(5));
        let mut remote = MemoryRemote::new(Vec::new(), at(5)).fail_on("add_item");
        let mut local = MemoryLocal::new(
            vec![ListItem::unchecked("bread"), ListItem::checked("soap")],
            at(20),
        );
        let mut watermarks = MemoryWatermarkStore::with(start);

        let err = run(&mut remote, &mut local, &mut watermarks).await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::MutationFailed {
                store: StoreKind::Remote,
                op: "add_item",
                ..
            }
        ));
        assert_eq!(watermarks.saves(), 0);
        assert_eq!(watermarks.stored(), Some(start));
        // The unchecked local item survives for the next attempt
        assert_eq!(local.items(), &[ListItem::unchecked("bread")]);
    }

    #[tokio::test]
    async fn test_flush_failure_aborts_run() {
        let mut remote = MemoryRemote::new(vec![ListItem::unchecked("milk")], at(10)).fail_on("flush");
        let mut local = MemoryLocal::new(Vec::new(), at(5));
        let mut watermarks = MemoryWatermarkStore::default();

        let err = run(&mut remote, &mut local, &mut watermarks).await.unwrap_err();

        assert_eq!(err.phase(), crate::error::Phase::Mutation);
        assert_eq!(watermarks.saves(), 0);
    }

    #[tokio::test]
    async fn test_retry_after_partial_failure_converges() {
        let mut remote = MemoryRemote::new(
            vec![ListItem::unchecked("milk"), ListItem::checked("eggs")],
            at(10),
        );
        let mut local = MemoryLocal::new(vec![ListItem::unchecked("x")], at(5)).fail_on("add_item");
        let mut watermarks = MemoryWatermarkStore::default();

        assert!(run(&mut remote, &mut local, &mut watermarks).await.is_err());

        // Local got cleared before the failure; remote lost its checked item
        let mut local = MemoryLocal::new(local.items().to_vec(), local.modified_at());
        let report = run(&mut remote, &mut local, &mut watermarks).await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::PushToLocal);
        assert_eq!(local.items(), &[ListItem::unchecked("milk")]);
        assert_eq!(watermarks.saves(), 1);
    }

    #[tokio::test]
    async fn test_missing_remote_item_is_tolerated() {
        let mut remote = MemoryRemote::new(vec![ListItem::unchecked("milk")], at(1))
            .with_phantom(ListItem::checked("ghost"));
        let mut local = MemoryLocal::new(vec![ListItem::unchecked("bread")], at(9));
        let mut watermarks = MemoryWatermarkStore::default();

        let report = run(&mut remote, &mut local, &mut watermarks).await.unwrap();

        assert_eq!(report.outcome, SyncOutcome::PushToRemote);
        assert_eq!(report.missing, 1);
        assert_eq!(remote.items(), &[ListItem::unchecked("bread")]);
        assert_eq!(watermarks.saves(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let mut remote = MemoryRemote::new(vec![ListItem::unchecked("milk")], at(10));
        let mut local = MemoryLocal::new(Vec::new(), at(5));
        let mut watermarks = MemoryWatermarkStore::default();

        let report = Reconciler::new(&mut remote, &mut local, &mut watermarks)
            .dry_run(true)
            .run()
            .await
            .unwrap();

        assert_eq!(report.outcome, SyncOutcome::PushToLocal);
        assert!(report.dry_run);
        assert!(remote.mutations().is_empty());
        assert!(local.mutations().is_empty());
        assert_eq!(watermarks.saves(), 0);
    }

    #[tokio::test]
    async fn test_import_moves_unchecked_items() {
        let mut remote = MemoryRemote::new(
            vec![
                ListItem::unchecked("milk"),
                ListItem::checked("eggs"),
                ListItem::unchecked("tea"),
            ],
            at(10),
        );
        let mut local = MemoryLocal::new(vec![ListItem::unchecked("bread")], at(5));

        let report = import_remote(&mut remote, &mut local).await.unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(remote.items(), &[ListItem::checked("eggs")]);
        let texts: Vec<_> = local.items().iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["bread", "milk", "tea"]);
        assert_eq!(remote.flushes(), 1);
    }

    #[tokio::test]
    async fn test_import_tolerates_items_already_gone() {
        let mut remote = MemoryRemote::new(vec![ListItem::unchecked("milk")], at(10))
            .with_phantom(ListItem::unchecked("ghost"));
        let mut local = MemoryLocal::new(Vec::new(), at(5));

        let report = import_remote(&mut remote, &mut local).await.unwrap();

        assert_eq!(report.imported, 1);
        assert_eq!(report.missing, 1);
        assert!(remote.items().is_empty());
        assert_eq!(local.items().len(), 2);
        assert_eq!(remote.flushes(), 1);
    }

    #[tokio::test]
    async fn test_import_aborts_on_delete_failure() {
        let mut remote =
            MemoryRemote::new(vec![ListItem::unchecked("milk")], at(10)).fail_on("delete_item");
        let mut local = MemoryLocal::new(Vec::new(), at(5));

        let err = import_remote(&mut remote, &mut local).await.unwrap_err();

        assert!(matches!(err, SyncError::MutationFailed { op: "delete_item", .. }));
        assert_eq!(remote.flushes(), 0);
    }
}
