//! Workers command - show the worker slot records.

use colored::Colorize;
use handsoff_server::{Scheduler, SlotRecord, process_alive};

use crate::theme::Theme;

/// Whether the worker of a busy slot is still running. `None` when there
/// is nothing to check.
fn worker_alive(record: &SlotRecord) -> Option<bool> {
    if record.is_busy() {
        record.pid.map(process_alive)
    } else {
        None
    }
}

/// Print every slot of `scheduler`.
pub(crate) fn show_workers(scheduler: &Scheduler) -> anyhow::Result<()> {
    if scheduler.num_slots() == 0 {
        println!("{}", Theme::info("Worker pool disabled (num_workers = 0)"));
        return Ok(());
    }

    let slots = scheduler.slots()?;

    println!("\n{}", Theme::header("Worker Slots"));
    println!(
        "{:>4}  {:<6}  {:>8}  {:>8}",
        "SLOT".dimmed(),
        "STATE".dimmed(),
        "ISSUE".dimmed(),
        "PID".dimmed()
    );
    println!("{}", Theme::separator());

    let mut busy: usize = 0;
    let mut exited: usize = 0;
    for (slot, record) in &slots {
        let alive = worker_alive(record);
        if record.is_busy() {
            busy = busy.saturating_add(1);
        }
        if alive == Some(false) {
            exited = exited.saturating_add(1);
        }
        println!("{}", Theme::slot_row(*slot, record, alive));
    }

    println!(
        "\n{busy}/{} busy, records in {}",
        slots.len(),
        scheduler.dir().display()
    );
    if exited > 0 {
        println!(
            "{}",
            Theme::warning(&format!(
                "{exited} worker(s) exited; their slots are freed on the next server cycle"
            ))
        );
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use handsoff_test::{dead_pid, live_pid};

    #[test]
    fn liveness_only_for_busy_slots_with_pid() {
        assert_eq!(worker_alive(&SlotRecord::free()), None);
        assert_eq!(worker_alive(&SlotRecord::busy(1)), None);
        assert_eq!(
            worker_alive(&SlotRecord::busy(1).with_pid(Some(live_pid()))),
            Some(true)
        );
        assert_eq!(
            worker_alive(&SlotRecord::busy(1).with_pid(Some(dead_pid()))),
            Some(false)
        );
    }

    #[test]
    fn listing_reads_every_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(tmp.path().join("workers"), 2);
        scheduler.record_pid(1, 42, Some(dead_pid())).unwrap();

        show_workers(&scheduler).unwrap();
        assert!(scheduler.load(1).unwrap().is_busy());
    }

    #[test]
    fn disabled_pool_prints_notice() {
        let tmp = tempfile::tempdir().unwrap();
        show_workers(&Scheduler::new(tmp.path(), 0)).unwrap();
    }
}
