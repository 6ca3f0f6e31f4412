// Adapter/output scan: find the duplication output that drives a monitor

use tracing::{debug, info};

use super::types::MonitorHandle;
use crate::error::{CaptureError, CaptureResult};

/// Read-only view of the graphics adapter topology.
///
/// Adapters and outputs are owned values; anything not returned by
/// [`locate_output`] is dropped during the scan.
pub trait OutputTopology {
    type Adapter;
    type Output;

    /// Adapter at `index`, `None` past the last one.
    fn adapter(&self, index: u32) -> CaptureResult<Option<Self::Adapter>>;

    /// Output at `index` on `adapter`, `None` past the last one.
    fn output(&self, adapter: &Self::Adapter, index: u32) -> CaptureResult<Option<Self::Output>>;

    /// Monitor an output is attached to, `None` when it cannot be described.
    fn monitor_of(&self, output: &Self::Output) -> Option<MonitorHandle>;
}

/// Matched adapter/output pair and where it was found.
#[derive(Debug)]
pub struct LocatedOutput<A, O> {
    pub adapter: A,
    pub output: O,
    pub adapter_index: u32,
    pub output_index: u32,
}

/// Scan adapters in enumeration order, and outputs within each adapter,
/// for the one attached to `monitor`.
pub fn locate_output<T: OutputTopology>(
    topology: &T,
    monitor: MonitorHandle,
) -> CaptureResult<LocatedOutput<T::Adapter, T::Output>> {
    let mut adapter_index = 0;
    while let Some(adapter) = topology.adapter(adapter_index)? {
        let mut output_index = 0;
        while let Some(output) = topology.output(&adapter, output_index)? {
            match topology.monitor_of(&output) {
                Some(m) if m == monitor => {
                    info!(adapter_index, output_index, "duplication output located");
                    return Ok(LocatedOutput {
                        adapter,
                        output,
                        adapter_index,
                        output_index,
                    });
                }
                Some(_) => {}
                None => debug!(adapter_index, output_index, "output description unavailable"),
            }
            output_index += 1;
        }
        adapter_index += 1;
    }

    Err(CaptureError::target(
        "locate_output",
        format!("monitor output not found (monitor 0x{:X})", monitor.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Handle that counts how many of its kind are alive.
    #[derive(Debug)]
    struct Counted {
        live: Rc<Cell<i32>>,
        monitor: Option<MonitorHandle>,
        outputs: Vec<Option<MonitorHandle>>,
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    /// Adapters, each listing the monitors of its outputs.
    struct FakeTopology {
        adapters: Vec<Vec<Option<MonitorHandle>>>,
        live: Rc<Cell<i32>>,
        fail_at_adapter: Option<u32>,
    }

    impl FakeTopology {
        fn new(adapters: Vec<Vec<Option<MonitorHandle>>>) -> Self {
            Self {
                adapters,
                live: Rc::new(Cell::new(0)),
                fail_at_adapter: None,
            }
        }

        fn counted(&self, monitor: Option<MonitorHandle>, outputs: Vec<Option<MonitorHandle>>) -> Counted {
            self.live.set(self.live.get() + 1);
            Counted {
                live: Rc::clone(&self.live),
                monitor,
                outputs,
            }
        }
    }

    impl OutputTopology for FakeTopology {
        type Adapter = Counted;
        type Output = Counted;

        fn adapter(&self, index: u32) -> CaptureResult<Option<Counted>> {
            if self.fail_at_adapter == Some(index) {
                return Err(CaptureError::acquisition("EnumAdapters1", "EnumAdapters1 failed"));
            }
            Ok(self
                .adapters
                .get(index as usize)
                .map(|outputs| self.counted(None, outputs.clone())))
        }

        fn output(&self, adapter: &Counted, index: u32) -> CaptureResult<Option<Counted>> {
            Ok(adapter
                .outputs
                .get(index as usize)
                .map(|m| self.counted(*m, Vec::new())))
        }

        fn monitor_of(&self, output: &Counted) -> Option<MonitorHandle> {
            output.monitor
        }
    }

    fn m(v: isize) -> Option<MonitorHandle> {
        Some(MonitorHandle(v))
    }

    #[test]
    fn test_no_match_leaves_nothing_alive() {
        let topo = FakeTopology::new(vec![vec![m(1), None], vec![m(2)], vec![]]);

        let err = locate_output(&topo, MonitorHandle(9)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TargetResolution);
        assert!(err.message().starts_with("monitor output not found"));
        assert_eq!(topo.live.get(), 0);
    }

    #[test]
    fn test_match_reports_indices_and_keeps_only_pair() {
        let topo = FakeTopology::new(vec![vec![m(1)], vec![None, m(2), m(3)]]);

        let found = locate_output(&topo, MonitorHandle(3)).unwrap();

        assert_eq!((found.adapter_index, found.output_index), (1, 2));
        assert_eq!(found.output.monitor, m(3));
        assert_eq!(topo.live.get(), 2);
        drop(found);
        assert_eq!(topo.live.get(), 0);
    }

    #[test]
    fn test_first_match_in_enumeration_order_wins() {
        let topo = FakeTopology::new(vec![vec![m(5)], vec![m(5)]]);
        let found = locate_output(&topo, MonitorHandle(5)).unwrap();
        assert_eq!(found.adapter_index, 0);
    }

    #[test]
    fn test_enumeration_error_propagates_without_leaks() {
        let mut topo = FakeTopology::new(vec![vec![m(1)], vec![m(2)]]);
        topo.fail_at_adapter = Some(1);

        let err = locate_output(&topo, MonitorHandle(2)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Acquisition);
        assert_eq!(topo.live.get(), 0);
    }
}
