//! 动画帧事件
//!
//! 事件按 (动画, 帧) 登记在控制器持有的事件表中，动画进入该帧时触发。

use std::collections::HashMap;
use std::fmt;

use super::bone_animation::AnimationId;

/// 事件触发时的上下文
#[derive(Clone, Copy, Debug)]
pub struct EventContext<'a> {
    pub animation: AnimationId,
    pub animation_name: &'a str,
    pub frame: usize,
}

/// 帧事件
pub trait AnimationEvent: Send + Sync {
    fn perform_action(&mut self, context: &EventContext<'_>);
}

impl<F> AnimationEvent for F
where
    F: FnMut(&EventContext<'_>) + Send + Sync,
{
    fn perform_action(&mut self, context: &EventContext<'_>) {
        self(context)
    }
}

/// 帧事件表
#[derive(Default)]
pub struct AnimationEventTable {
    events: HashMap<(AnimationId, usize), Vec<Box<dyn AnimationEvent>>>,
}

impl fmt::Debug for AnimationEventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationEventTable")
            .field("frames", &self.events.len())
            .finish()
    }
}

impl AnimationEventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记事件，同一帧可以登记多个，按登记顺序触发
    pub fn add_animation_event(
        &mut self,
        animation: AnimationId,
        frame: usize,
        event: impl AnimationEvent + 'static,
    ) {
        self.events
            .entry((animation, frame))
            .or_default()
            .push(Box::new(event));
    }

    /// 登记闭包事件
    pub fn on_frame<F>(&mut self, animation: AnimationId, frame: usize, f: F)
    where
        F: FnMut(&EventContext<'_>) + Send + Sync + 'static,
    {
        self.add_animation_event(animation, frame, f);
    }

    pub fn event_count(&self, animation: AnimationId, frame: usize) -> usize {
        self.events.get(&(animation, frame)).map_or(0, Vec::len)
    }

    /// 某个动画登记了事件的所有帧（升序）
    pub fn frames(&self, animation: AnimationId) -> Vec<usize> {
        let mut frames: Vec<usize> = self
            .events
            .keys()
            .filter(|(id, _)| *id == animation)
            .map(|(_, frame)| *frame)
            .collect();
        frames.sort_unstable();
        frames
    }

    pub fn remove_animation(&mut self, animation: AnimationId) {
        self.events.retain(|(id, _), _| *id != animation);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 触发某帧的所有事件，返回触发数量
    pub fn fire(&mut self, animation: AnimationId, animation_name: &str, frame: usize) -> usize {
        let Some(events) = self.events.get_mut(&(animation, frame)) else {
            return 0;
        };
        let context = EventContext {
            animation,
            animation_name,
            frame,
        };
        for event in events.iter_mut() {
            event.perform_action(&context);
        }
        tracing::trace!(
            target: "animation",
            "Fired {} event(s) for '{}' at frame {}",
            events.len(),
            animation_name,
            frame
        );
        events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Footstep {
        hits: Arc<AtomicUsize>,
    }

    impl AnimationEvent for Footstep {
        fn perform_action(&mut self, _context: &EventContext<'_>) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_fire_in_registration_order() {
        let mut table = AnimationEventTable::new();
        let id = AnimationId::next();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = order.clone();
        table.on_frame(id, 2, move |_ctx| first.lock().unwrap().push(1));
        let second = order.clone();
        table.on_frame(id, 2, move |_ctx| second.lock().unwrap().push(2));

        assert_eq!(table.fire(id, "walk", 2), 2);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
        assert_eq!(table.fire(id, "walk", 3), 0);
    }

    #[test]
    fn test_struct_events_and_removal() {
        let mut table = AnimationEventTable::new();
        let walk = AnimationId::next();
        let run = AnimationId::next();
        let hits = Arc::new(AtomicUsize::new(0));
        table.add_animation_event(walk, 0, Footstep { hits: hits.clone() });
        table.add_animation_event(walk, 4, Footstep { hits: hits.clone() });
        table.add_animation_event(run, 1, Footstep { hits: hits.clone() });

        assert_eq!(table.frames(walk), vec![0, 4]);
        table.fire(walk, "walk", 4);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        table.remove_animation(walk);
        assert_eq!(table.event_count(walk, 0), 0);
        assert_eq!(table.event_count(run, 1), 1);
    }

    #[test]
    fn test_context_carries_frame() {
        let mut table = AnimationEventTable::new();
        let id = AnimationId::next();
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let sink = seen.clone();
        table.on_frame(id, 7, move |ctx| sink.store(ctx.frame, Ordering::SeqCst));
        table.fire(id, "jump", 7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }
}
