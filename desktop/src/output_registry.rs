//! Outputs and the per-output frame loop.
use std::{collections::HashMap, time::Duration};

use log::{debug, error, info, warn};

use perch_geometry::Rect;
use perch_scene::OutputId;
use perch_util::{Id, IdTable, Subscription};

use crate::{Mode, Server, events::OutputSignals, select_mode};

#[derive(Debug)]
pub struct Output {
    id: OutputId,
    /// The mode that was committed successfully, if any.
    mode: Option<Mode>,
    /// The area the output covers in layout coordinates.
    area: Rect,
    /// Presentation time of the most recent frame.
    last_frame: Duration,
    listeners: OutputListeners,
}

impl Output {
    pub fn id(&self) -> OutputId {
        self.id
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn area(&self) -> Rect {
        self.area
    }
}

#[derive(Debug)]
struct OutputListeners {
    frame: Subscription,
    destroy: Subscription,
}

impl OutputListeners {
    fn subscribe(signals: &mut OutputSignals, output: OutputId) -> Self {
        Self {
            frame: signals
                .frame
                .subscribe(move |server: &mut Server, _| server.on_output_frame(output)),
            destroy: signals
                .destroy
                .subscribe(move |server: &mut Server, _| server.on_output_destroy(output)),
        }
    }

    fn unsubscribe(self, signals: Option<&mut OutputSignals>) {
        // Without signals the tokens' source is gone and they can be dropped.
        if let Some(signals) = signals {
            signals.frame.unsubscribe(self.frame);
            signals.destroy.unsubscribe(self.destroy);
        }
    }
}

/// All outputs in the order they were announced.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    outputs: IdTable<Output>,
    order: Vec<Id>,
    index: HashMap<OutputId, Id>,
}

impl OutputRegistry {
    pub fn get(&self, output: OutputId) -> Option<&Output> {
        self.outputs.get(*self.index.get(&output)?)
    }

    fn get_mut(&mut self, output: OutputId) -> Option<&mut Output> {
        self.outputs.get_mut(*self.index.get(&output)?)
    }

    pub fn contains(&self, output: OutputId) -> bool {
        self.index.contains_key(&output)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Output> {
        self.order.iter().map(|id| &self.outputs[*id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn insert(&mut self, output: Output) {
        let key = output.id;
        let id = self.outputs.insert(output);
        self.order.push(id);
        self.index.insert(key, id);
    }

    fn remove(&mut self, output: OutputId) -> Option<Output> {
        let id = self.index.remove(&output)?;
        self.order.retain(|o| *o != id);
        self.outputs.take(id)
    }

    fn ids(&self) -> Vec<OutputId> {
        self.iter().map(|output| output.id).collect()
    }
}

impl Server {
    pub(crate) fn on_new_output(&mut self, output: OutputId) {
        if self.outputs.contains(output) {
            warn!("{output} announced twice, ignoring");
            return;
        }

        if let Err(e) = self.backend.init_output_render(output) {
            error!("Failed to initialize rendering on {output}: {e:?}");
            return;
        }

        let mut committed = None;
        match select_mode(&self.backend.output_modes(output)) {
            Some(mode) => match self.backend.commit_output_mode(output, mode) {
                Ok(()) => committed = Some(mode),
                Err(e) if self.backend.output_requires_mode(output) => {
                    error!("Failed to commit mode {mode} on {output}, abandoning it: {e:?}");
                    return;
                }
                Err(e) => error!("Failed to commit mode {mode} on {output}: {e:?}"),
            },
            None => debug!("{output} has no modes, keeping the backend's configuration"),
        }

        let Some(signals) = self.sources.outputs.get_mut(&output) else {
            error!("{output} has no event sources, abandoning it");
            return;
        };
        let listeners = OutputListeners::subscribe(signals, output);

        let area = self.backend.add_output_to_layout(output);
        self.scene.attach_output(output, area);

        self.outputs.insert(Output {
            id: output,
            mode: committed,
            area,
            last_frame: Duration::ZERO,
            listeners,
        });

        match committed {
            Some(mode) => info!("New {output} at {area:?} with mode {mode}"),
            None => info!("New {output} at {area:?}"),
        }
    }

    /// Render the scene onto the output and tell clients the frame is done.
    pub(crate) fn on_output_frame(&mut self, output: OutputId) {
        let Some(target) = self.scene.render_target(output) else {
            error!("{output} is not attached to the scene");
            return;
        };

        if let Err(e) = self.scene.commit(target) {
            error!("Failed to commit {output}: {e:?}");
        }

        let Some(record) = self.outputs.get_mut(output) else {
            warn!("Frame for unknown {output}");
            return;
        };
        let timestamp = match self.clock.now() {
            Ok(now) => {
                record.last_frame = now;
                now
            }
            Err(e) => {
                // Clients still need the frame done event. Reuse the last known time.
                warn!("Failed to read the frame clock: {e:?}");
                record.last_frame
            }
        };

        self.scene.send_frame_done(target, timestamp);
    }

    pub(crate) fn on_output_destroy(&mut self, output: OutputId) {
        let Some(record) = self.outputs.remove(output) else {
            warn!("Destroy of unknown {output}");
            return;
        };
        record
            .listeners
            .unsubscribe(self.sources.outputs.get_mut(&output));

        self.backend.remove_output_from_layout(output);
        self.scene.detach_output(output);
        info!("Removed {output}");
    }

    /// Release every output, as if each was destroyed.
    pub(crate) fn release_outputs(&mut self) {
        for output in self.outputs.ids() {
            self.on_output_destroy(output);
        }
    }
}
