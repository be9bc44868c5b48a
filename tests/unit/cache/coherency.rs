use super::*;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(&'static str, CacheArea)>>,
}

impl CacheOps for Recorder {
    fn clean(&self, area: &CacheArea) {
        self.calls.lock().unwrap().push(("clean", *area));
    }
    fn invalidate(&self, area: &CacheArea) {
        self.calls.lock().unwrap().push(("invalidate", *area));
    }
}

fn manager() -> (Arc<Recorder>, CoherencyManager) {
    let rec = Arc::new(Recorder::default());
    let mgr = CoherencyManager::new(rec.clone());
    (rec, mgr)
}

#[test]
fn clean_forwards_exact_region() {
    let (rec, mgr) = manager();
    let area = CacheArea::new(64, 40, 5, 400);
    mgr.clean_for_hw_read(&area);
    assert_eq!(*rec.calls.lock().unwrap(), vec![("clean", area)]);
    let stats = mgr.stats();
    assert_eq!(stats.cleans, 1);
    assert_eq!(stats.cleaned_bytes, 200);
}

#[test]
fn empty_regions_are_not_maintained() {
    let (rec, mgr) = manager();
    mgr.clean_for_hw_read(&CacheArea::new(0, 0, 5, 400));
    mgr.begin_hw_write(&CacheArea::new(0, 16, 0, 400));
    assert!(rec.calls.lock().unwrap().is_empty());
    assert!(mgr.pending_writes().is_empty());
}

#[test]
fn cpu_access_invalidates_only_overlapping_writes() {
    let (rec, mgr) = manager();
    let left = CacheArea::new(0, 16, 4, 64);
    let right = CacheArea::new(32, 16, 4, 64);
    mgr.begin_hw_write(&left);
    mgr.begin_hw_write(&right);

    let n = mgr.prepare_cpu_access(&CacheArea::new(8, 4, 1, 64));
    assert_eq!(n, 1);
    assert_eq!(*rec.calls.lock().unwrap(), vec![("invalidate", left)]);
    assert_eq!(mgr.pending_writes(), vec![right]);

    assert_eq!(mgr.prepare_cpu_access(&CacheArea::new(8, 4, 1, 64)), 0);
}

#[test]
fn sync_all_drains_pending_writes() {
    let (rec, mgr) = manager();
    mgr.begin_hw_write(&CacheArea::new(0, 16, 4, 64));
    mgr.begin_hw_write(&CacheArea::new(32, 16, 4, 64));
    assert_eq!(mgr.sync_all(), 2);
    assert_eq!(rec.calls.lock().unwrap().len(), 2);
    assert!(mgr.pending_writes().is_empty());
    assert_eq!(mgr.stats().invalidates, 2);
    assert_eq!(mgr.stats().invalidated_bytes, 128);
}
