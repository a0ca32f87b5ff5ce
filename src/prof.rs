//! Queue profiling: per-name aggregate times, cross-queue overlap
//! detection, a textual summary and timeline export.
//!
//! A [`Profile`] session collects the events retained by one or more
//! profiling-enabled queues, reduces them once via [`Profile::calc`], and
//! then serves sorted views, a cached summary and timeline export any
//! number of times. Sessions are not thread-safe; use one per thread or
//! synchronize externally.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant as WallInstant};

use cl_sys as ffi;

use crate::error::{Error, Result, Status};
use crate::standard::Queue;
use crate::types::{command_type_name, CommandQueueProperties};


/// Whether an instant marks the start or the end of an event occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstantKind {
    Start,
    End,
}

/// A single start or end timestamp, in device nanoseconds.
#[derive(Clone, Debug)]
pub struct ProfInstant {
    pub kind: InstantKind,
    /// Interned event-name id (see [`Profile::event_names`]).
    pub name_id: usize,
    /// Distinguishes occurrences sharing a name.
    pub unique_id: usize,
    pub instant: u64,
}

/// The full profiling data of one event occurrence.
#[derive(Clone, Debug)]
pub struct ProfRecord {
    pub name: String,
    /// Display name of the native command kind which produced the event.
    pub command: &'static str,
    pub queue_name: String,
    pub queued: u64,
    pub submit: u64,
    pub start: u64,
    pub end: u64,
}

/// Total time attributed to all events sharing a name.
#[derive(Clone, Debug)]
pub struct Aggregate {
    pub name: String,
    pub absolute_time: u64,
    /// Fraction of the total events time, in `[0, 1]`.
    pub relative_time: f64,
}

/// Time during which two named events were simultaneously in flight.
#[derive(Clone, Debug)]
pub struct Overlap {
    pub name1: String,
    pub name2: String,
    pub duration: u64,
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggSort {
    Name,
    Time,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordSort {
    EventName,
    QueueName,
    Queued,
    Submitted,
    Started,
    Ended,
}

/// Ties are broken with `Start` before `End` under either criterion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstantSort {
    Instant,
    UniqueId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlapSort {
    NamePair,
    Duration,
}

fn apply_order<T, F>(items: &mut Vec<&T>, order: SortOrder, mut cmp: F)
        where F: FnMut(&T, &T) -> ::std::cmp::Ordering {
    match order {
        SortOrder::Asc => items.sort_by(|a, b| cmp(a, b)),
        SortOrder::Desc => items.sort_by(|a, b| cmp(b, a)),
    }
}


/// Timeline export configuration, passed explicitly to the export calls.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Column separator.
    pub separator: String,
    /// Line terminator.
    pub newline: String,
    /// Delimiter wrapped around queue names.
    pub queue_delim: String,
    /// Delimiter wrapped around event names.
    pub event_delim: String,
    /// Subtract the earliest observed start from every timestamp.
    pub zero_start: bool,
}

impl Default for ExportOptions {
    fn default() -> ExportOptions {
        ExportOptions {
            separator: "\t".into(),
            newline: "\n".into(),
            queue_delim: String::new(),
            event_delim: String::new(),
            zero_start: true,
        }
    }
}


/// A profiling session.
pub struct Profile {
    queues: Vec<(String, Queue)>,
    calced: bool,
    timer_start: Option<WallInstant>,
    elapsed: Option<Duration>,
    earliest_start: u64,
    names: Vec<String>,
    name_ids: HashMap<String, usize>,
    instants: Vec<ProfInstant>,
    records: Vec<ProfRecord>,
    aggregates: Vec<Aggregate>,
    overlaps: Vec<Overlap>,
    total_events_time: u64,
    total_overlap: u64,
    effective_total: u64,
    summary: Option<String>,
}

impl Profile {
    pub fn new() -> Profile {
        Profile {
            queues: Vec::new(),
            calced: false,
            timer_start: None,
            elapsed: None,
            earliest_start: u64::MAX,
            names: Vec::new(),
            name_ids: HashMap::new(),
            instants: Vec::new(),
            records: Vec::new(),
            aggregates: Vec::new(),
            overlaps: Vec::new(),
            total_events_time: 0,
            total_overlap: 0,
            effective_total: 0,
            summary: None,
        }
    }

    /// Starts the optional wall-clock timer.
    pub fn start(&mut self) {
        self.timer_start = Some(WallInstant::now());
    }

    /// Stops the wall-clock timer.
    pub fn stop(&mut self) {
        self.elapsed = self.timer_start.map(|start| start.elapsed());
    }

    /// Registers `queue` under `name`. Registering a second queue under an
    /// existing name replaces the first with a warning.
    pub fn add_queue<S: Into<String>>(&mut self, name: S, queue: &Queue) -> Result<()> {
        if self.calced {
            return Err(Error::InvalidArgument(
                "queues cannot be added after calc()".into()));
        }
        let name = name.into();
        if let Some(entry) = self.queues.iter_mut().find(|(n, _)| *n == name) {
            log::warn!("queue '{}' already registered for profiling; replacing", name);
            entry.1 = queue.clone();
        } else {
            self.queues.push((name, queue.clone()));
        }
        Ok(())
    }

    fn intern_name(&mut self, name: &str) -> usize {
        if let Some(&id) = self.name_ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_owned());
        self.name_ids.insert(name.to_owned(), id);
        id
    }

    /// Collects and reduces the profiling data of every registered queue.
    /// Runs exactly once per session; each processed queue is gc'd.
    pub fn calc(&mut self) -> Result<()> {
        if self.calced {
            return Err(Error::InvalidArgument(
                "calc() may only run once per session".into()));
        }

        let queues = self.queues.clone();
        let mut unique_id = 0usize;

        for (queue_name, queue) in &queues {
            let props = queue.properties()?;
            if !props.contains(CommandQueueProperties::PROFILING_ENABLE) {
                return Err(Error::InvalidArgument(
                    format!("queue '{}' is not profiling-enabled", queue_name)));
            }

            for event in queue.events() {
                let timings = (|| -> Result<[u64; 4]> {
                    Ok([
                        event.profiling_info(ffi::CL_PROFILING_COMMAND_QUEUED)?,
                        event.profiling_info(ffi::CL_PROFILING_COMMAND_SUBMIT)?,
                        event.profiling_info(ffi::CL_PROFILING_COMMAND_START)?,
                        event.profiling_info(ffi::CL_PROFILING_COMMAND_END)?,
                    ])
                })();

                let [queued, submit, start, end] = match timings {
                    Ok(t) => t,
                    Err(ref err) if profiling_unavailable(err) => {
                        log::debug!("skipping event without profiling info on \
                            queue '{}': {}", queue_name, err);
                        continue;
                    },
                    Err(err) => return Err(err),
                };

                let name = event.name();
                let name_id = self.intern_name(&name);
                let command = match event.command_type() {
                    Ok(command_type) => command_type_name(command_type),
                    Err(_) => "UNKNOWN",
                };

                if end > start {
                    self.instants.push(ProfInstant {
                        kind: InstantKind::Start, name_id, unique_id, instant: start,
                    });
                    self.instants.push(ProfInstant {
                        kind: InstantKind::End, name_id, unique_id, instant: end,
                    });
                    if start < self.earliest_start {
                        self.earliest_start = start;
                    }
                }

                self.records.push(ProfRecord {
                    name,
                    command,
                    queue_name: queue_name.clone(),
                    queued, submit, start, end,
                });

                unique_id += 1;
            }

            queue.gc();
        }

        let (aggregates, total) = compute_aggregates(&self.names, &mut self.instants);
        self.aggregates = aggregates;
        self.total_events_time = total;

        let (overlaps, total_overlap) = compute_overlaps(&self.names, &mut self.instants);
        self.overlaps = overlaps;
        self.total_overlap = total_overlap;
        self.effective_total = self.total_events_time.saturating_sub(total_overlap);

        self.calced = true;
        Ok(())
    }

    fn require_calced(&self) -> Result<()> {
        if self.calced {
            Ok(())
        } else {
            Err(Error::InvalidArgument("calc() has not run yet".into()))
        }
    }

    /// Interned event names; `name_id` fields index into this list.
    pub fn event_names(&self) -> &[String] {
        &self.names
    }

    pub fn total_events_time(&self) -> u64 {
        self.total_events_time
    }

    pub fn total_overlap(&self) -> u64 {
        self.total_overlap
    }

    /// Total events time minus total overlap: the wall-clock device
    /// occupancy.
    pub fn effective_total(&self) -> u64 {
        self.effective_total
    }

    /// Wall-clock time between `start()` and `stop()`, if the timer ran.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn aggregates(&self) -> &[Aggregate] {
        &self.aggregates
    }

    pub fn records(&self) -> &[ProfRecord] {
        &self.records
    }

    pub fn instants(&self) -> &[ProfInstant] {
        &self.instants
    }

    pub fn overlaps(&self) -> &[Overlap] {
        &self.overlaps
    }

    pub fn aggregates_sorted(&self, crit: AggSort, order: SortOrder) -> Vec<&Aggregate> {
        let mut items: Vec<&Aggregate> = self.aggregates.iter().collect();
        match crit {
            AggSort::Name => apply_order(&mut items, order, |a, b| a.name.cmp(&b.name)),
            AggSort::Time => apply_order(&mut items, order,
                |a, b| a.absolute_time.cmp(&b.absolute_time)),
        }
        items
    }

    pub fn records_sorted(&self, crit: RecordSort, order: SortOrder) -> Vec<&ProfRecord> {
        let mut items: Vec<&ProfRecord> = self.records.iter().collect();
        match crit {
            RecordSort::EventName => apply_order(&mut items, order,
                |a, b| a.name.cmp(&b.name)),
            RecordSort::QueueName => apply_order(&mut items, order,
                |a, b| a.queue_name.cmp(&b.queue_name)),
            RecordSort::Queued => apply_order(&mut items, order,
                |a, b| a.queued.cmp(&b.queued)),
            RecordSort::Submitted => apply_order(&mut items, order,
                |a, b| a.submit.cmp(&b.submit)),
            RecordSort::Started => apply_order(&mut items, order,
                |a, b| a.start.cmp(&b.start)),
            RecordSort::Ended => apply_order(&mut items, order,
                |a, b| a.end.cmp(&b.end)),
        }
        items
    }

    pub fn instants_sorted(&self, crit: InstantSort, order: SortOrder) -> Vec<&ProfInstant> {
        let mut items: Vec<&ProfInstant> = self.instants.iter().collect();
        match crit {
            InstantSort::Instant => apply_order(&mut items, order,
                |a, b| (a.instant, a.kind == InstantKind::End)
                    .cmp(&(b.instant, b.kind == InstantKind::End))),
            InstantSort::UniqueId => apply_order(&mut items, order,
                |a, b| (a.unique_id, a.kind == InstantKind::End)
                    .cmp(&(b.unique_id, b.kind == InstantKind::End))),
        }
        items
    }

    pub fn overlaps_sorted(&self, crit: OverlapSort, order: SortOrder) -> Vec<&Overlap> {
        let mut items: Vec<&Overlap> = self.overlaps.iter().collect();
        match crit {
            OverlapSort::NamePair => apply_order(&mut items, order,
                |a, b| (&a.name1, &a.name2).cmp(&(&b.name1, &b.name2))),
            OverlapSort::Duration => apply_order(&mut items, order,
                |a, b| a.duration.cmp(&b.duration)),
        }
        items
    }

    /// A textual summary: aggregate and overlap tables plus totals. Built
    /// on the first call and cached.
    pub fn summary(&mut self) -> Result<&str> {
        self.require_calced()?;
        let summary = match self.summary.take() {
            Some(cached) => cached,
            None => self.build_summary(),
        };
        Ok(self.summary.get_or_insert(summary).as_str())
    }

    fn build_summary(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, " Aggregate times by event:");
        let _ = writeln!(out, "   {:-<64}", "");
        let _ = writeln!(out, "   | {:<30} | {:>12} | {:>12} |", "Event name",
            "Rel. time", "Abs. time(s)");
        let _ = writeln!(out, "   {:-<64}", "");
        for agg in self.aggregates_sorted(AggSort::Time, SortOrder::Desc) {
            let _ = writeln!(out, "   | {:<30} | {:>12.4} | {:>12.6} |",
                agg.name, agg.relative_time, agg.absolute_time as f64 * 1e-9);
        }
        let _ = writeln!(out, "   {:-<64}", "");

        if !self.overlaps.is_empty() {
            let _ = writeln!(out, " Event overlaps:");
            let _ = writeln!(out, "   {:-<64}", "");
            for ov in self.overlaps_sorted(OverlapSort::Duration, SortOrder::Desc) {
                let _ = writeln!(out, "   | {:<20} | {:<20} | {:>12.6} |",
                    ov.name1, ov.name2, ov.duration as f64 * 1e-9);
            }
            let _ = writeln!(out, "   {:-<64}", "");
        }

        let _ = writeln!(out, " Total events time      : {:.6}s",
            self.total_events_time as f64 * 1e-9);
        let _ = writeln!(out, " Total events eff. time : {:.6}s",
            self.effective_total as f64 * 1e-9);

        if let Some(elapsed) = self.elapsed {
            let elapsed_s = elapsed.as_secs_f64();
            let _ = writeln!(out, " Total elapsed time     : {:.6}s", elapsed_s);
            if elapsed_s > 0.0 {
                let device = (self.effective_total as f64 * 1e-9) / elapsed_s;
                let _ = writeln!(out, " Device time fraction   : {:.4}", device);
                let _ = writeln!(out, " Host time fraction     : {:.4}",
                    (1.0 - device).max(0.0));
            }
        }

        out
    }

    /// Writes the event timeline, one record per line, sorted by start
    /// time.
    pub fn export_info<W: Write>(&self, writer: &mut W, opts: &ExportOptions)
            -> Result<()> {
        self.require_calced()?;

        let base = if opts.zero_start && self.earliest_start != u64::MAX {
            self.earliest_start
        } else {
            0
        };

        for record in self.records_sorted(RecordSort::Started, SortOrder::Asc) {
            write!(writer, "{qd}{queue}{qd}{sep}{start}{sep}{end}{sep}{ed}{name}{ed}{nl}",
                qd = opts.queue_delim,
                queue = record.queue_name,
                sep = opts.separator,
                start = record.start.saturating_sub(base),
                end = record.end.saturating_sub(base),
                ed = opts.event_delim,
                name = record.name,
                nl = opts.newline)?;
        }
        Ok(())
    }

    /// As [`export_info`], writing to a file at `path`.
    ///
    /// [`export_info`]: Profile::export_info
    pub fn export_info_file<P: AsRef<Path>>(&self, path: P, opts: &ExportOptions)
            -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        self.export_info(&mut writer, opts)?;
        writer.flush()?;
        Ok(())
    }
}

impl Default for Profile {
    fn default() -> Profile {
        Profile::new()
    }
}

fn profiling_unavailable(err: &Error) -> bool {
    match *err {
        Error::InfoUnavailable(_) => true,
        _ => err.api_status() == Some(Status::CL_PROFILING_INFO_NOT_AVAILABLE),
    }
}


/// Sorts instants by (unique id, Start before End) and walks pairwise,
/// charging each occurrence's duration to its name's aggregate.
fn compute_aggregates(names: &[String], instants: &mut Vec<ProfInstant>)
        -> (Vec<Aggregate>, u64) {
    instants.sort_by_key(|i| (i.unique_id, i.kind == InstantKind::End));

    let mut absolute = vec![0u64; names.len()];
    let mut total = 0u64;

    for pair in instants.chunks_exact(2) {
        let (start, end) = (&pair[0], &pair[1]);
        debug_assert_eq!(start.unique_id, end.unique_id);
        let duration = end.instant - start.instant;
        absolute[start.name_id] += duration;
        total += duration;
    }

    let aggregates = names.iter().enumerate()
        .map(|(id, name)| Aggregate {
            name: name.clone(),
            absolute_time: absolute[id],
            relative_time: if total > 0 {
                absolute[id] as f64 / total as f64
            } else {
                0.0
            },
        })
        .collect();
    (aggregates, total)
}

/// Walks instants in time order maintaining the set of in-flight
/// occurrences; overlap is tracked per occurrence pair and aggregated to
/// name pairs on emission.
fn compute_overlaps(names: &[String], instants: &mut [ProfInstant])
        -> (Vec<Overlap>, u64) {
    // End before Start on equal instants, so touching intervals produce a
    // zero-duration (dropped) overlap.
    instants.sort_by_key(|i| (i.instant, i.kind == InstantKind::Start));

    let name_of: HashMap<usize, usize> = instants.iter()
        .map(|i| (i.unique_id, i.name_id))
        .collect();

    let mut occurring: HashSet<usize> = HashSet::new();
    let mut overlap_start: HashMap<(usize, usize), u64> = HashMap::new();
    let mut matrix: HashMap<(usize, usize), u64> = HashMap::new();
    let mut total_overlap = 0u64;

    let uid_key = |a: usize, b: usize| (a.min(b), a.max(b));

    for inst in instants.iter() {
        match inst.kind {
            InstantKind::Start => {
                for &other in occurring.iter() {
                    overlap_start.insert(uid_key(inst.unique_id, other), inst.instant);
                }
                occurring.insert(inst.unique_id);
            },
            InstantKind::End => {
                occurring.remove(&inst.unique_id);
                for &other in occurring.iter() {
                    if let Some(&begun) = overlap_start.get(&uid_key(inst.unique_id, other)) {
                        let duration = inst.instant - begun;
                        if duration > 0 {
                            let a = name_of[&inst.unique_id];
                            let b = name_of[&other];
                            *matrix.entry((a.min(b), a.max(b))).or_insert(0) += duration;
                            total_overlap += duration;
                        }
                    }
                }
            },
        }
    }

    let mut overlaps: Vec<Overlap> = matrix.into_iter()
        .filter(|&(_, duration)| duration > 0)
        .map(|((a, b), duration)| Overlap {
            name1: names[a].clone(),
            name2: names[b].clone(),
            duration,
        })
        .collect();
    overlaps.sort_by(|x, y| (&x.name1, &x.name2).cmp(&(&y.name1, &y.name2)));
    (overlaps, total_overlap)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn instant(kind: InstantKind, name_id: usize, unique_id: usize, instant: u64)
            -> ProfInstant {
        ProfInstant { kind, name_id, unique_id, instant }
    }

    fn occurrence(name_id: usize, unique_id: usize, start: u64, end: u64)
            -> Vec<ProfInstant> {
        vec![
            instant(InstantKind::Start, name_id, unique_id, start),
            instant(InstantKind::End, name_id, unique_id, end),
        ]
    }

    /// A session pre-filled with reduced data, bypassing native queues.
    fn synthetic_profile(names: Vec<&str>, occurrences: Vec<(usize, u64, u64)>)
            -> Profile {
        let mut prof = Profile::new();
        prof.names = names.iter().map(|s| s.to_string()).collect();
        for (id, name) in prof.names.iter().enumerate() {
            prof.name_ids.insert(name.clone(), id);
        }

        for (uid, &(name_id, start, end)) in occurrences.iter().enumerate() {
            prof.instants.extend(occurrence(name_id, uid, start, end));
            prof.records.push(ProfRecord {
                name: prof.names[name_id].clone(),
                command: "USER",
                queue_name: format!("q{}", name_id),
                queued: start, submit: start, start, end,
            });
            if start < prof.earliest_start {
                prof.earliest_start = start;
            }
        }

        let (aggregates, total) = compute_aggregates(&prof.names, &mut prof.instants);
        prof.aggregates = aggregates;
        prof.total_events_time = total;
        let (overlaps, total_overlap) = compute_overlaps(&prof.names, &mut prof.instants);
        prof.overlaps = overlaps;
        prof.total_overlap = total_overlap;
        prof.effective_total = total - total_overlap;
        prof.calced = true;
        prof
    }

    #[test]
    fn single_event_aggregate() {
        let prof = synthetic_profile(vec!["k"], vec![(0, 100, 600)]);
        assert_eq!(prof.aggregates().len(), 1);
        let agg = &prof.aggregates()[0];
        assert_eq!(agg.absolute_time, 500);
        assert!((agg.relative_time - 1.0).abs() < 1e-12);
        assert!(prof.overlaps().is_empty());
        assert_eq!(prof.effective_total(), 500);
    }

    #[test]
    fn same_name_events_aggregate() {
        let prof = synthetic_profile(vec!["k", "m"], vec![
            (0, 0, 100),
            (0, 200, 350),
            (1, 400, 500),
        ]);
        let aggs = prof.aggregates_sorted(AggSort::Name, SortOrder::Asc);
        assert_eq!(aggs[0].name, "k");
        assert_eq!(aggs[0].absolute_time, 250);
        assert_eq!(aggs[1].absolute_time, 100);
        assert_eq!(prof.total_events_time(), 350);
        assert!((aggs[0].relative_time - 250.0 / 350.0).abs() < 1e-12);
    }

    #[test]
    fn identical_intervals_overlap_fully() {
        let prof = synthetic_profile(vec!["k", "m"], vec![
            (0, 100, 200),
            (1, 100, 200),
        ]);
        assert_eq!(prof.overlaps().len(), 1);
        let ov = &prof.overlaps()[0];
        assert_eq!(ov.duration, 100);
        assert_eq!((ov.name1.as_str(), ov.name2.as_str()), ("k", "m"));
        assert_eq!(prof.total_overlap(), 100);
        assert_eq!(prof.effective_total(), 100);
    }

    #[test]
    fn partial_overlap_duration() {
        // k: [0, 300); m: [200, 500) -> overlap [200, 300).
        let prof = synthetic_profile(vec!["k", "m"], vec![
            (0, 0, 300),
            (1, 200, 500),
        ]);
        assert_eq!(prof.overlaps()[0].duration, 100);
        assert_eq!(prof.effective_total(), 600 - 100);
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        let prof = synthetic_profile(vec!["k", "m"], vec![
            (0, 0, 100),
            (1, 100, 200),
        ]);
        assert!(prof.overlaps().is_empty());
        assert_eq!(prof.effective_total(), 200);
    }

    #[test]
    fn same_name_overlap_tracked_per_occurrence() {
        // Two occurrences of "k" overlapping each other on [100, 200).
        let prof = synthetic_profile(vec!["k"], vec![
            (0, 0, 200),
            (0, 100, 300),
        ]);
        assert_eq!(prof.overlaps().len(), 1);
        let ov = &prof.overlaps()[0];
        assert_eq!((ov.name1.as_str(), ov.name2.as_str()), ("k", "k"));
        assert_eq!(ov.duration, 100);
    }

    #[test]
    fn three_way_overlap_charges_each_pair() {
        // a: [0, 100), b: [10, 90), c: [20, 80).
        let prof = synthetic_profile(vec!["a", "b", "c"], vec![
            (0, 0, 100),
            (1, 10, 90),
            (2, 20, 80),
        ]);
        let find = |x: &str, y: &str| prof.overlaps().iter()
            .find(|o| o.name1 == x && o.name2 == y)
            .map(|o| o.duration);
        assert_eq!(find("a", "b"), Some(80));
        assert_eq!(find("a", "c"), Some(60));
        assert_eq!(find("b", "c"), Some(60));
        assert_eq!(prof.total_overlap(), 200);
    }

    #[test]
    fn sorted_views() {
        let prof = synthetic_profile(vec!["b", "a"], vec![
            (0, 50, 100),
            (1, 0, 300),
        ]);

        let by_name = prof.aggregates_sorted(AggSort::Name, SortOrder::Asc);
        assert_eq!(by_name[0].name, "a");

        let by_time = prof.aggregates_sorted(AggSort::Time, SortOrder::Desc);
        assert_eq!(by_time[0].name, "a");
        assert_eq!(by_time[0].absolute_time, 300);

        let by_start = prof.records_sorted(RecordSort::Started, SortOrder::Asc);
        assert_eq!(by_start[0].start, 0);

        let by_uid = prof.instants_sorted(InstantSort::UniqueId, SortOrder::Asc);
        assert_eq!(by_uid[0].unique_id, 0);
        assert_eq!(by_uid[0].kind, InstantKind::Start);
        assert_eq!(by_uid[1].kind, InstantKind::End);
    }

    #[test]
    fn instant_sort_starts_before_ends_on_ties() {
        // k ends exactly where m starts.
        let prof = synthetic_profile(vec!["k", "m"], vec![
            (0, 0, 100),
            (1, 100, 200),
        ]);
        let by_instant = prof.instants_sorted(InstantSort::Instant, SortOrder::Asc);
        assert_eq!(by_instant[0].kind, InstantKind::Start);
        assert_eq!(by_instant[1].instant, 100);
        assert_eq!(by_instant[1].kind, InstantKind::Start);
        assert_eq!(by_instant[2].instant, 100);
        assert_eq!(by_instant[2].kind, InstantKind::End);
        assert_eq!(by_instant[3].kind, InstantKind::End);
    }

    #[test]
    fn records_carry_command_kind() {
        let prof = synthetic_profile(vec!["k"], vec![(0, 0, 100)]);
        assert_eq!(prof.records()[0].command, "USER");
        let by_start = prof.records_sorted(RecordSort::Started, SortOrder::Asc);
        assert_eq!(by_start[0].command, "USER");
    }

    #[test]
    fn export_zero_based_and_sorted() {
        let prof = synthetic_profile(vec!["k", "m"], vec![
            (0, 1000, 1300),
            (1, 1100, 1200),
        ]);
        let mut out = Vec::new();
        prof.export_info(&mut out, &ExportOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "q0\t0\t300\tk");
        assert_eq!(lines[1], "q1\t100\t200\tm");
    }

    #[test]
    fn export_options_respected() {
        let prof = synthetic_profile(vec!["k"], vec![(0, 500, 900)]);
        let opts = ExportOptions {
            separator: ", ".into(),
            newline: "\n".into(),
            queue_delim: "'".into(),
            event_delim: "\"".into(),
            zero_start: false,
        };
        let mut out = Vec::new();
        prof.export_info(&mut out, &opts).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "'q0', 500, 900, \"k\"\n");
    }

    #[test]
    fn summary_cached() {
        let mut prof = synthetic_profile(vec!["k", "m"], vec![
            (0, 0, 100),
            (1, 50, 150),
        ]);
        let first = prof.summary().unwrap().to_owned();
        assert!(first.contains("k"));
        assert!(first.contains("Total events time"));
        let second = prof.summary().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn calc_gate() {
        let mut prof = Profile::new();
        assert!(prof.summary().is_err());
        let mut out = Vec::new();
        assert!(prof.export_info(&mut out, &ExportOptions::default()).is_err());
    }
}
