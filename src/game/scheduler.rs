use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::rules::ScheduledResolution;
use super::state::Generation;

/// 毫秒时间戳，由调用方提供（浏览器中为 `Date.now()`，测试中为虚拟时钟）。
pub type Millis = u64;

#[derive(Debug, Clone)]
struct PendingItem {
    due_at: Millis,
    order: u64,
    resolution: ScheduledResolution,
}

impl PartialEq for PendingItem {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at && self.order == other.order
    }
}

impl Eq for PendingItem {}

impl PartialOrd for PendingItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// 最早到期的排在堆顶
impl Ord for PendingItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_at
            .cmp(&self.due_at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug, Default)]
pub struct ResolutionQueue {
    heap: BinaryHeap<PendingItem>,
    order: u64,
}

impl ResolutionQueue {
    /// 返回该判定的到期时间。
    pub fn schedule(&mut self, resolution: ScheduledResolution, now: Millis) -> Millis {
        self.order += 1;
        let due_at = now.saturating_add(u64::from(resolution.delay_ms));
        self.heap.push(PendingItem {
            due_at,
            order: self.order,
            resolution,
        });
        due_at
    }

    pub fn next_due(&self) -> Option<Millis> {
        self.heap.peek().map(|item| item.due_at)
    }

    pub fn pop_due(&mut self, now: Millis) -> Option<ScheduledResolution> {
        if self.next_due()? > now {
            return None;
        }
        self.heap.pop().map(|item| item.resolution)
    }

    /// 丢弃旧会话遗留的判定。
    pub fn discard_before(&mut self, generation: Generation) -> usize {
        let before = self.heap.len();
        self.heap
            .retain(|item| item.resolution.generation >= generation);
        before - self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
