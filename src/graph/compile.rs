//! Graph compilation (spec.md §4.1 `compile()`): reachability pruning,
//! topological sort, lifetime analysis, physical allocation with
//! aliasing, and barrier/split-barrier synthesis.
//!
//! Grounded on the teacher's `src/frame/sched.rs` (`Frame::schedule`,
//! which already notes that a plain `petgraph::toposort` isn't enough and
//! reaches for a custom ordering heuristic) and `src/frame/alloc.rs`
//! (`allocate_physical_resources`, whose doc comment states the same two
//! aliasing rules implemented here). We use `petgraph` for the dependency
//! graph itself but walk it with an explicit Kahn's-algorithm pass so
//! ties break on declaration order, exactly as spec.md §4.1 requires.

use std::collections::VecDeque;

use ash::vk;
use fxhash::{FxHashMap, FxHashSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::device::{BufferHandle, Device, ImageDesc, ImageHandle};
use crate::error::GraphError;

use super::pass::PassKind;
use super::resource::{AccessRecord, ResourceDescription, VirtualResourceRecord};

#[derive(Clone, Copy, Debug)]
pub struct Barrier {
    pub resource_id: u32,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub old_layout: Option<vk::ImageLayout>,
    pub new_layout: Option<vk::ImageLayout>,
}

#[derive(Clone, Copy, Debug)]
pub struct SplitBarrierOp {
    pub resource_id: u32,
    pub producer_position: usize,
    pub consumer_position: usize,
    pub barrier: Barrier,
}

pub struct CompiledSchedule {
    /// Pass indices (into `Graph::passes`) in execution order.
    pub schedule: Vec<usize>,
    /// Regular barriers to issue immediately before `schedule[i]`.
    pub barriers_before: Vec<Vec<Barrier>>,
    /// Split-barrier waits to issue immediately before `schedule[i]`
    /// (disjoint from `barriers_before`: a hazard is either inline or split,
    /// never both).
    pub split_waits_before: Vec<Vec<SplitBarrierOp>>,
    /// Split-barrier signals to issue right after `schedule[i]` finishes.
    pub split_signals_after: Vec<Vec<SplitBarrierOp>>,
    pub skipped_passes: Vec<(usize, GraphError)>,
}

/// Builds the dependency graph (RAW/WAR/WAW edges over resource accesses),
/// prunes unreachable passes, and returns passes in schedule order with
/// ties broken on declaration order — everything up to but not including
/// physical allocation and barrier synthesis, which need the resource
/// table mutably.
pub(crate) fn toposort_reachable(
    pass_count: usize,
    resources: &[VirtualResourceRecord],
    side_effect: &[bool],
) -> Result<Vec<usize>, GraphError> {
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(pass_count, pass_count * 2);
    let nodes: Vec<NodeIndex> = (0..pass_count).map(|i| graph.add_node(i)).collect();

    for record in resources {
        // RAW: a read of version v depends on the pass that produced v.
        for access in &record.accesses {
            if access.intent == super::access::AccessIntent::Read {
                if access.version == 0 {
                    if !record.imported {
                        return Err(GraphError::GraphReadOfUnwritten {
                            pass_name: format!("pass#{}", access.pass),
                            resource_name: record.name.clone(),
                        });
                    }
                    continue;
                }
                if let Some(&writer) = record.writers.get((access.version - 1) as usize) {
                    graph.update_edge(nodes[writer], nodes[access.pass], ());
                }
            }
        }
        // WAR / WAW: a write of version v+1 depends on every reader of
        // version v and on the writer of version v.
        for v in 1..=record.current_version {
            if let Some(&writer_of_v) = record.writers.get((v - 1) as usize) {
                for access in &record.accesses {
                    if access.version == v - 1 && access.intent == super::access::AccessIntent::Read {
                        graph.update_edge(nodes[access.pass], nodes[writer_of_v], ());
                    }
                }
                if v > 1 {
                    if let Some(&prev_writer) = record.writers.get((v - 2) as usize) {
                        graph.update_edge(nodes[prev_writer], nodes[writer_of_v], ());
                    }
                }
            }
        }
    }

    // Reachability: roots are passes with a side effect or that wrote an
    // exported resource; keep every ancestor of a root.
    let mut roots: Vec<usize> = (0..pass_count).filter(|&p| side_effect[p]).collect();
    for record in resources {
        if record.exported {
            if let Some(writer) = record.last_writer_pass {
                roots.push(writer);
            }
        }
    }
    let mut reachable: FxHashSet<usize> = FxHashSet::default();
    let mut stack: Vec<usize> = roots.clone();
    while let Some(p) = stack.pop() {
        if reachable.insert(p) {
            for edge in graph.edges_directed(nodes[p], petgraph::Direction::Incoming) {
                stack.push(*graph.node_weight(edge.source()).unwrap());
            }
        }
    }
    if reachable.is_empty() && !roots.is_empty() {
        reachable.extend(roots);
    }

    // Kahn's algorithm restricted to the reachable set, processing ready
    // nodes in ascending declaration order for a deterministic tie-break.
    let mut in_degree: FxHashMap<usize, usize> = FxHashMap::default();
    for &p in &reachable {
        in_degree.insert(p, 0);
    }
    for &p in &reachable {
        for edge in graph.edges_directed(nodes[p], petgraph::Direction::Outgoing) {
            let target = *graph.node_weight(edge.target()).unwrap();
            if reachable.contains(&target) {
                *in_degree.get_mut(&target).unwrap() += 1;
            }
        }
    }

    let mut ready: VecDeque<usize> = VecDeque::new();
    let mut ready_sorted: Vec<usize> = in_degree.iter().filter(|(_, &d)| d == 0).map(|(&p, _)| p).collect();
    ready_sorted.sort_unstable();
    ready.extend(ready_sorted);

    let mut order = Vec::with_capacity(reachable.len());
    let mut visited_count = 0;
    while let Some(p) = pop_min(&mut ready) {
        order.push(p);
        visited_count += 1;
        let mut newly_ready = Vec::new();
        for edge in graph.edges_directed(nodes[p], petgraph::Direction::Outgoing) {
            let target = *graph.node_weight(edge.target()).unwrap();
            if !reachable.contains(&target) {
                continue;
            }
            let d = in_degree.get_mut(&target).unwrap();
            *d -= 1;
            if *d == 0 {
                newly_ready.push(target);
            }
        }
        newly_ready.sort_unstable();
        for n in newly_ready {
            ready.push_back(n);
        }
    }

    if visited_count != reachable.len() {
        return Err(GraphError::GraphCompileCycle {
            pass_name: format!("pass#{}", order.len()),
        });
    }

    Ok(order)
}

fn pop_min(ready: &mut VecDeque<usize>) -> Option<usize> {
    if ready.is_empty() {
        return None;
    }
    let (min_pos, _) = ready.iter().enumerate().min_by_key(|(_, &v)| v)?;
    ready.remove(min_pos)
}

/// Physical allocation: greedy interval-packing over disjoint lifetimes,
/// per spec.md §4.1 "Aliasing" and §3.5 invariant 4. Imported/exported
/// resources are pinned and skip aliasing entirely.
pub(crate) fn allocate_physical(
    device: &mut impl Device,
    resources: &mut [VirtualResourceRecord],
    schedule: &[usize],
) -> Result<(), GraphError> {
    let position_of: FxHashMap<usize, usize> = schedule.iter().enumerate().map(|(pos, &p)| (p, pos)).collect();

    for record in resources.iter_mut() {
        let positions: Vec<usize> = record
            .accesses
            .iter()
            .filter_map(|a: &AccessRecord| position_of.get(&a.pass).copied())
            .collect();
        if let (Some(&first), Some(&last)) = (positions.iter().min(), positions.iter().max()) {
            record.lifetime = Some((first, last));
        }
    }

    let mut buffer_pool: Vec<(usize, (u64, crate::device::BufferUsage), BufferHandle)> = Vec::new();
    let mut image_pool: Vec<(usize, ImageDesc, ImageHandle)> = Vec::new();

    let mut order: Vec<usize> = (0..resources.len())
        .filter(|&i| resources[i].lifetime.is_some() && !resources[i].imported)
        .collect();
    order.sort_by_key(|&i| resources[i].lifetime.unwrap().0);

    for i in order {
        let (first, last) = resources[i].lifetime.unwrap();
        match &resources[i].description.clone() {
            ResourceDescription::Buffer(desc) => {
                let bucket = (size_bucket(desc.size_bytes), desc.usage);
                if let Some(slot) = buffer_pool.iter_mut().find(|(free_at, key, _)| *key == bucket && *free_at <= first) {
                    resources[i].physical_buffer = Some(slot.2);
                    slot.0 = last + 1;
                } else {
                    let handle = device.create_buffer(desc.clone())?;
                    resources[i].physical_buffer = Some(handle);
                    buffer_pool.push((last + 1, bucket, handle));
                }
            }
            ResourceDescription::Image(desc) => {
                if let Some(slot) = image_pool.iter_mut().find(|(free_at, key, _)| key.aliasing_compatible(desc) && *free_at <= first) {
                    resources[i].physical_image = Some(slot.2);
                    slot.0 = last + 1;
                } else {
                    let handle = device.create_image(desc.clone())?;
                    resources[i].physical_image = Some(handle);
                    image_pool.push((last + 1, desc.clone(), handle));
                }
            }
        }
    }

    Ok(())
}

fn size_bucket(size: u64) -> u64 {
    // Round up to the next power-of-two bucket so nearly-equal sizes
    // still alias.
    size.next_power_of_two()
}

/// Barrier and split-barrier synthesis (spec.md §4.1 "Barrier synthesis
/// rules"), walking each resource's access timeline in schedule order.
pub(crate) fn synthesize_barriers(
    resources: &[VirtualResourceRecord],
    schedule: &[usize],
    kinds: &[PassKind],
) -> (Vec<Vec<Barrier>>, Vec<Vec<SplitBarrierOp>>, Vec<Vec<SplitBarrierOp>>) {
    let position_of: FxHashMap<usize, usize> = schedule.iter().enumerate().map(|(pos, &p)| (p, pos)).collect();
    let mut barriers_before: Vec<Vec<Barrier>> = vec![Vec::new(); schedule.len()];
    let mut split_waits_before: Vec<Vec<SplitBarrierOp>> = vec![Vec::new(); schedule.len()];
    let mut split_signals_after: Vec<Vec<SplitBarrierOp>> = vec![Vec::new(); schedule.len()];

    for (resource_id, record) in resources.iter().enumerate() {
        let mut timeline: Vec<&AccessRecord> = record
            .accesses
            .iter()
            .filter(|a| position_of.contains_key(&a.pass))
            .collect();
        timeline.sort_by_key(|a| position_of[&a.pass]);

        for window in timeline.windows(2) {
            let (prev, curr) = (window[0], window[1]);
            let same = prev.stage_mask == curr.stage_mask
                && prev.access_mask == curr.access_mask
                && prev.layout == curr.layout;
            if same && curr.intent == super::access::AccessIntent::Read && prev.intent == super::access::AccessIntent::Read {
                continue; // coalesced adjacent read
            }
            if prev.layout == curr.layout
                && prev.intent == super::access::AccessIntent::Read
                && curr.intent == super::access::AccessIntent::Read
            {
                continue; // two reads, no layout change: no hazard
            }

            let barrier = Barrier {
                resource_id: resource_id as u32,
                src_stage: prev.stage_mask,
                dst_stage: curr.stage_mask,
                src_access: prev.access_mask,
                dst_access: curr.access_mask,
                old_layout: prev.layout,
                new_layout: curr.layout,
            };

            let producer_pos = position_of[&prev.pass];
            let consumer_pos = position_of[&curr.pass];
            let producer_is_compute = kinds[prev.pass] == PassKind::Compute;
            let far_enough = consumer_pos >= producer_pos + 2;
            let different_stage = prev.stage_mask != curr.stage_mask;

            if producer_is_compute && far_enough && different_stage {
                let op = SplitBarrierOp {
                    resource_id: resource_id as u32,
                    producer_position: producer_pos,
                    consumer_position: consumer_pos,
                    barrier,
                };
                split_signals_after[producer_pos].push(op);
                split_waits_before[consumer_pos].push(op);
            } else {
                barriers_before[consumer_pos].push(barrier);
            }
        }
    }

    (barriers_before, split_waits_before, split_signals_after)
}
