use crate::artifacts::graph::serializer::serialize;
use crate::artifacts::graph::snapshot::SnapshotBuilder;
use crate::artifacts::graph::source::{ObjectStore, ReferenceStore};
use crate::artifacts::watch::error::WatchError;
use crate::artifacts::watch::renderer::{RenderProcess, Renderer};
use std::io::{self, BufWriter, Write};
use std::sync::mpsc::Receiver;

/// Requests handled by the render worker, one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Replace the live renderer with one showing a fresh snapshot
    Render,
    /// Stop the live renderer and exit
    Shutdown,
}

/// Owns the renderer lifecycle: at most one render process is alive at a time
pub struct RenderWorker<O, R, Rn: Renderer> {
    builder: SnapshotBuilder<O, R>,
    renderer: Rn,
    current: Option<Rn::Process>,
}

impl<O, R, Rn> RenderWorker<O, R, Rn>
where
    O: ObjectStore,
    R: ReferenceStore,
    Rn: Renderer,
{
    pub fn new(builder: SnapshotBuilder<O, R>, renderer: Rn) -> Self {
        RenderWorker {
            builder,
            renderer,
            current: None,
        }
    }

    /// Handle control messages until told to shut down
    ///
    /// A closed channel counts as a shutdown request. Requests queued while a
    /// render was running collapse into one, and a queued shutdown wins over
    /// any render queued before it.
    pub fn run(mut self, control: Receiver<Control>) {
        while let Ok(message) = control.recv() {
            if message == Control::Shutdown || Self::drain(&control) == Control::Shutdown {
                break;
            }

            if let Err(error) = self.render() {
                tracing::error!(%error, "render failed");
                self.stop_current();
            }
        }

        self.stop_current();
        tracing::debug!("render worker stopped");
    }

    /// Consume every pending message, returning the one that should act
    fn drain(control: &Receiver<Control>) -> Control {
        let mut skipped = 0usize;
        while let Ok(message) = control.try_recv() {
            match message {
                Control::Shutdown => return Control::Shutdown,
                Control::Render => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!(skipped, "coalesced render requests");
        }
        Control::Render
    }

    fn render(&mut self) -> Result<(), WatchError> {
        self.stop_current();

        let mut process = self.renderer.spawn()?;
        let input = process.take_input();
        self.current = Some(process);

        let input = input.ok_or_else(|| {
            WatchError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "renderer input is not available",
            ))
        })?;
        // dropping the writer closes the renderer's input, whatever happens below
        let mut writer = BufWriter::new(input);

        let snapshot = self.builder.build()?;
        serialize(&snapshot, snapshot.shorten_length(), &mut writer).map_err(WatchError::Write)?;
        writer.flush().map_err(WatchError::Write)?;

        tracing::info!(entities = snapshot.len(), "graph rendered");

        Ok(())
    }

    fn stop_current(&mut self) {
        if let Some(mut process) = self.current.take()
            && let Err(error) = process.terminate()
        {
            tracing::warn!(%error, "failed to stop renderer");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::artifacts::graph::fixture::{MemoryObjects, MemoryRefs};
    use crate::artifacts::graph::snapshot::HeadVisibility;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::channel;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub struct RenderLog {
        pub started: AtomicUsize,
        pub live: AtomicUsize,
        pub max_live: AtomicUsize,
        pub outputs: Mutex<Vec<Arc<Mutex<Vec<u8>>>>>,
    }

    impl RenderLog {
        pub fn started(&self) -> usize {
            self.started.load(Ordering::SeqCst)
        }

        pub fn live(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }

        pub fn max_live(&self) -> usize {
            self.max_live.load(Ordering::SeqCst)
        }

        pub fn last_output(&self) -> String {
            let outputs = self.outputs.lock().unwrap();
            let last = outputs.last().unwrap().lock().unwrap();
            String::from_utf8(last.clone()).unwrap()
        }
    }

    /// Renderer recording how many processes it started and how many overlap
    #[derive(Debug, Clone, Default)]
    pub struct FakeRenderer {
        pub log: Arc<RenderLog>,
        pub fail_spawn: bool,
    }

    pub struct FakeProcess {
        log: Arc<RenderLog>,
        input: Option<Box<dyn Write + Send>>,
        alive: bool,
    }

    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Renderer for FakeRenderer {
        type Process = FakeProcess;

        fn spawn(&mut self) -> Result<FakeProcess, WatchError> {
            if self.fail_spawn {
                return Err(WatchError::Subprocess {
                    action: "start",
                    source: io::Error::from(io::ErrorKind::NotFound),
                });
            }

            self.log.started.fetch_add(1, Ordering::SeqCst);
            let live = self.log.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.log.max_live.fetch_max(live, Ordering::SeqCst);

            let buffer = Arc::new(Mutex::new(Vec::new()));
            self.log.outputs.lock().unwrap().push(buffer.clone());

            Ok(FakeProcess {
                log: self.log.clone(),
                input: Some(Box::new(SharedBuffer(buffer))),
                alive: true,
            })
        }
    }

    impl RenderProcess for FakeProcess {
        fn take_input(&mut self) -> Option<Box<dyn Write + Send>> {
            self.input.take()
        }

        fn terminate(&mut self) -> Result<(), WatchError> {
            if self.alive {
                self.alive = false;
                self.log.live.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn worker(
        objects: MemoryObjects,
        renderer: FakeRenderer,
    ) -> RenderWorker<MemoryObjects, MemoryRefs, FakeRenderer> {
        let refs = MemoryRefs::attached("refs/heads/main").with_ref("refs/heads/main", "cccc3333");
        let builder = SnapshotBuilder::new(objects, refs, HeadVisibility::Show);
        RenderWorker::new(builder, renderer)
    }

    fn sample_objects() -> MemoryObjects {
        MemoryObjects::default()
            .with_blob("aaaa1111")
            .with_tree("bbbb2222", &[("file", "aaaa1111")])
            .with_commit("cccc3333", "bbbb2222", &[])
    }

    fn run_with(worker: RenderWorker<MemoryObjects, MemoryRefs, FakeRenderer>, messages: &[Control]) {
        let (tx, rx) = channel();
        for message in messages {
            tx.send(*message).unwrap();
        }
        drop(tx);
        worker.run(rx);
    }

    /// Send renders one by one, each after the previous one started
    fn render_in_turn(
        worker: RenderWorker<MemoryObjects, MemoryRefs, FakeRenderer>,
        log: &RenderLog,
        renders: usize,
    ) {
        let (tx, rx) = channel();
        let handle = std::thread::spawn(move || worker.run(rx));
        for expected in 1..=renders {
            tx.send(Control::Render).unwrap();
            while log.started() < expected {
                std::thread::yield_now();
            }
        }
        tx.send(Control::Shutdown).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn keeps_at_most_one_renderer_alive() {
        let renderer = FakeRenderer::default();
        let log = renderer.log.clone();

        render_in_turn(worker(sample_objects(), renderer), &log, 3);

        assert_eq!(log.started(), 3);
        assert_eq!(log.max_live(), 1);
        assert_eq!(log.live(), 0);
    }

    #[test]
    fn writes_a_complete_graph() {
        let renderer = FakeRenderer::default();
        let log = renderer.log.clone();

        render_in_turn(worker(sample_objects(), renderer), &log, 1);

        let output = log.last_output();
        assert!(output.starts_with("digraph G {\n"));
        assert!(output.ends_with("}\n"));
        assert!(output.contains("\"HEAD\" -> \"refs/heads/main\""));
    }

    #[test]
    fn failed_snapshots_stop_the_renderer_and_keep_going() {
        let renderer = FakeRenderer::default();
        let log = renderer.log.clone();

        render_in_turn(worker(MemoryObjects::failing(), renderer), &log, 2);

        assert_eq!(log.started(), 2);
        assert_eq!(log.max_live(), 1);
        assert_eq!(log.live(), 0);
    }

    #[test]
    fn failed_spawns_are_survived() {
        let renderer = FakeRenderer {
            fail_spawn: true,
            ..FakeRenderer::default()
        };
        let log = renderer.log.clone();

        run_with(worker(sample_objects(), renderer), &[Control::Render]);

        assert_eq!(log.started(), 0);
    }

    #[test]
    fn queued_renders_collapse_into_one() {
        let renderer = FakeRenderer::default();
        let log = renderer.log.clone();

        run_with(
            worker(sample_objects(), renderer),
            &[Control::Render, Control::Render, Control::Render],
        );

        assert_eq!(log.started(), 1);
        assert_eq!(log.live(), 0);
    }

    #[test]
    fn queued_shutdown_wins_over_earlier_renders() {
        let renderer = FakeRenderer::default();
        let log = renderer.log.clone();

        run_with(
            worker(sample_objects(), renderer),
            &[Control::Render, Control::Render, Control::Shutdown],
        );

        assert_eq!(log.started(), 0);
    }

    #[test]
    fn messages_after_shutdown_are_ignored() {
        let renderer = FakeRenderer::default();
        let log = renderer.log.clone();

        run_with(
            worker(sample_objects(), renderer),
            &[Control::Shutdown, Control::Render],
        );

        assert_eq!(log.started(), 0);
    }
}
