//! Rename and copy detection
//!
//! Added blobs are paired with deleted (or, for copies, surviving) blobs whose
//! content is similar enough. Similarity is the share of lines both sides have in
//! common, counted as a multiset.

use crate::artifacts::diff::delta::{DeltaRecord, DeltaStatus, FileMap};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};

/// Content of one side of a candidate pair
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'c> {
    pub content: &'c [u8],
    pub binary: bool,
}

/// Similarity of two contents as a percentage
pub fn score(old: Candidate<'_>, new: Candidate<'_>) -> u8 {
    if old.content == new.content {
        return 100;
    }
    if old.binary || new.binary {
        return 0;
    }

    let mut old_lines: HashMap<&[u8], usize> = HashMap::new();
    for line in old.content.split_inclusive(|byte| *byte == b'\n') {
        *old_lines.entry(line).or_default() += 1;
    }
    let old_total = old_lines.values().sum::<usize>();

    let mut new_total = 0;
    let mut common = 0;
    for line in new.content.split_inclusive(|byte| *byte == b'\n') {
        new_total += 1;
        if let Some(count) = old_lines.get_mut(line)
            && *count > 0
        {
            *count -= 1;
            common += 1;
        }
    }

    if old_total + new_total == 0 {
        return 100;
    }
    ((2 * common * 100) / (old_total + new_total)) as u8
}

/// Components of `a` and `b` outside their common prefix
pub fn path_distance(a: &Path, b: &Path) -> usize {
    let a = a.components().collect::<Vec<Component<'_>>>();
    let b = b.components().collect::<Vec<Component<'_>>>();
    let shared = a.iter().zip(&b).take_while(|(x, y)| x == y).count();

    (a.len() - shared) + (b.len() - shared)
}

#[derive(Debug)]
struct Pairing {
    score: u8,
    distance: usize,
    source: PathBuf,
    source_index: usize,
    target_index: usize,
}

/// Pair sources with targets, best score first
///
/// Ties go to the shorter path distance, then to the lexically smaller source path.
/// Each source and each target takes part in at most one pair unless
/// `reuse_sources` is set.
fn pair<S>(
    sources: &[&DeltaRecord],
    targets: &[&DeltaRecord],
    threshold: u8,
    reuse_sources: bool,
    mut score_of: S,
) -> Vec<(usize, usize, u8)>
where
    S: FnMut(&DeltaRecord, &DeltaRecord) -> Option<u8>,
{
    let mut candidates = Vec::new();

    for (target_index, target) in targets.iter().enumerate() {
        for (source_index, source) in sources.iter().enumerate() {
            let Some(score) = score_of(source, target) else {
                continue;
            };
            if score < threshold {
                continue;
            }
            candidates.push(Pairing {
                score,
                distance: path_distance(&source.old_path, &target.new_path),
                source: source.old_path.clone(),
                source_index,
                target_index,
            });
        }
    }

    candidates.sort_by(|a, b| {
        (Reverse(a.score), a.distance, &a.source, a.target_index).cmp(&(
            Reverse(b.score),
            b.distance,
            &b.source,
            b.target_index,
        ))
    });

    let mut used_sources = BTreeSet::new();
    let mut used_targets = BTreeSet::new();
    let mut pairs = Vec::new();

    for candidate in candidates {
        if used_targets.contains(&candidate.target_index)
            || (!reuse_sources && used_sources.contains(&candidate.source_index))
        {
            continue;
        }
        used_sources.insert(candidate.source_index);
        used_targets.insert(candidate.target_index);
        pairs.push((candidate.source_index, candidate.target_index, candidate.score));
    }

    pairs
}

/// Whether two records may be paired at all: both blobs of the same file kind
fn compatible(source: &DeltaRecord, target: &DeltaRecord) -> bool {
    match (source.old_entry, target.new_entry) {
        (Some(old), Some(new)) => {
            old.kind() == new.kind()
                && !old.mode.is_gitlink()
                && !old.is_tree()
                && !old.mode.is_type_change(&new.mode)
        }
        _ => false,
    }
}

/// Rewrite Added/Deleted records into Renamed and Copied ones
///
/// `copy_sources` lists the old-side files that survive on the new side; it is only
/// consulted when `find_copies` is set. `content_of` loads one side of a record,
/// `true` selecting the old side.
pub fn detect<C>(
    deltas: Vec<DeltaRecord>,
    copy_sources: Option<&FileMap>,
    threshold: u8,
    find_renames: bool,
    mut content_of: C,
) -> Vec<DeltaRecord>
where
    C: FnMut(&DeltaRecord, bool) -> Option<(bytes::Bytes, bool)>,
{
    let mut cache: HashMap<(PathBuf, bool), Option<(bytes::Bytes, bool)>> = HashMap::new();
    let mut load = |record: &DeltaRecord, old_side: bool| {
        let key = (
            if old_side {
                record.old_path.clone()
            } else {
                record.new_path.clone()
            },
            old_side,
        );
        cache
            .entry(key)
            .or_insert_with(|| content_of(record, old_side))
            .clone()
    };

    let mut score_of = |source: &DeltaRecord, target: &DeltaRecord| {
        if !compatible(source, target) {
            return None;
        }
        if let (Some(old), Some(new)) = (source.old_entry, target.new_entry)
            && old.oid == new.oid
        {
            return Some(100);
        }
        let (old_content, old_binary) = load(source, true)?;
        let (new_content, new_binary) = load(target, false)?;
        Some(score(
            Candidate {
                content: &old_content,
                binary: old_binary,
            },
            Candidate {
                content: &new_content,
                binary: new_binary,
            },
        ))
    };

    let mut consumed = BTreeSet::new();
    let mut produced = Vec::new();

    if find_renames {
        let deleted = indices_with(&deltas, DeltaStatus::Deleted);
        let added = indices_with(&deltas, DeltaStatus::Added);
        let sources = deleted.iter().map(|i| &deltas[*i]).collect::<Vec<_>>();
        let targets = added.iter().map(|i| &deltas[*i]).collect::<Vec<_>>();

        let pairs = pair(&sources, &targets, threshold, false, &mut score_of);
        for (source, target, similarity) in pairs {
            consumed.insert(deleted[source]);
            consumed.insert(added[target]);
            produced.push(DeltaRecord::paired(
                sources[source],
                targets[target],
                DeltaStatus::Renamed,
                similarity,
            ));
        }
    }

    if let Some(copy_sources) = copy_sources {
        let survivors = copy_sources
            .iter()
            .map(|(path, entry)| DeltaRecord::between(path.clone(), Some(*entry), None))
            .collect::<Vec<_>>();
        let added = indices_with(&deltas, DeltaStatus::Added)
            .into_iter()
            .filter(|i| !consumed.contains(i))
            .collect::<Vec<_>>();
        let sources = survivors.iter().collect::<Vec<_>>();
        let targets = added.iter().map(|i| &deltas[*i]).collect::<Vec<_>>();

        let pairs = pair(&sources, &targets, threshold, true, &mut score_of);
        for (source, target, similarity) in pairs {
            consumed.insert(added[target]);
            produced.push(DeltaRecord::paired(
                sources[source],
                targets[target],
                DeltaStatus::Copied,
                similarity,
            ));
        }
    }

    let mut result = deltas
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !consumed.contains(i))
        .map(|(_, delta)| delta)
        .chain(produced)
        .collect::<Vec<_>>();
    sort_deltas(&mut result);
    result
}

fn indices_with(deltas: &[DeltaRecord], status: DeltaStatus) -> Vec<usize> {
    deltas
        .iter()
        .enumerate()
        .filter(|(_, delta)| {
            delta.status == status
                && delta
                    .old_entry
                    .or(delta.new_entry)
                    .is_some_and(|entry| !entry.is_tree())
        })
        .map(|(i, _)| i)
        .collect()
}

/// Records ordered by reported path, then by source path
///
/// A deletion sorts before any other record of the same path.
pub fn sort_deltas(deltas: &mut [DeltaRecord]) {
    fn rank(delta: &DeltaRecord) -> (u8, u8) {
        match delta.status {
            DeltaStatus::Deleted => (0, 0),
            other => (1, other.value()),
        }
    }

    deltas.sort_by(|a, b| {
        (&a.new_path, &a.old_path, rank(a)).cmp(&(&b.new_path, &b.old_path, rank(b)))
    });
}
