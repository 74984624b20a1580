//! Driving batched flushes from a tokio frame loop.

use anyhow::Result;
use host_dom::MemoryDom;
use reconciler::{App, ReconcilerConfig, RenderOptions, frame_channel};
use serde_json::json;
use std::rc::Rc;
use vdom::{Component, Props, VirtualNode, into_state, value_text};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Updates requested between ticks are applied by the next tick of the loop,
    /// and the loop ends once the application is removed.
    ///
    /// # Panics
    /// Panics if the loop does not apply the batched update.
    #[tokio::test]
    async fn batched_updates_follow_the_frame_loop() -> Result<()> {
        init_logs();
        let config = ReconcilerConfig::new(true, 1, true);
        let (frames, mut frame_loop) = frame_channel(config.frame_interval());
        let app = App::new();
        let dom = MemoryDom::new();
        app.mount(VirtualNode::element("h1").text("Pluto").build()?)?;
        let handle = app.render(dom.clone(), Rc::new(frames), RenderOptions::from_config(&config))?;
        assert_eq!(dom.inner_html(), "<h1>Pluto</h1>");

        app.mount(VirtualNode::element("h1").text("Saturn").build()?)?;
        app.mount(VirtualNode::element("h1").text("Jupiter").build()?)?;
        assert_eq!(dom.inner_html(), "<h1>Pluto</h1>");
        assert_eq!(frame_loop.next_frame().await, 1);
        assert_eq!(dom.inner_html(), "<h1>Jupiter</h1>");
        assert_eq!(handle.counters().flushes, 2);

        app.mount(VirtualNode::element("h1").text("Mars").build()?)?;
        handle.remove()?;
        frame_loop.run().await;
        assert_eq!(dom.inner_html(), "");
        assert_eq!(handle.counters().flushes, 2);
        Ok(())
    }

    /// A send made inside a flush is picked up by a later tick.
    ///
    /// # Panics
    /// Panics if the follow-up render never happens.
    #[tokio::test]
    async fn hook_sends_are_flushed_by_the_loop() -> Result<()> {
        init_logs();
        let clock = Component::builder("Clock")
            .initial_state(|_| into_state(json!({ "tick": 0 })))
            .render(|_, state| {
                VirtualNode::element("time")
                    .text(value_text(state.get("tick")))
                    .build()
                    .unwrap_or(VirtualNode::Empty)
            })
            .after_mount(|context| context.send.send(into_state(json!({ "tick": 1 }))))
            .build();
        let (frames, mut frame_loop) = frame_channel(ReconcilerConfig::default().frame_interval());
        let app = App::new();
        let dom = MemoryDom::new();
        app.mount(clock.node(Props::new()))?;
        let handle = app.render(dom.clone(), Rc::new(frames), RenderOptions::batched())?;
        assert_eq!(dom.inner_html(), "<time>0</time>");

        frame_loop.next_frame().await;
        assert_eq!(dom.inner_html(), "<time>1</time>");

        handle.remove()?;
        assert_eq!(frame_loop.next_frame().await, 0);
        assert!(frame_loop.is_closed());
        Ok(())
    }
}
