//! Typed message queues drained once per superstep.

use std::marker::PhantomData;
use std::mem;

use bytemuck::Pod;
use transport::Pid;

use crate::error::WorldResult;
use crate::world::World;
use crate::QueueId;

/// One record delivered to a [`Queue`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Message<Tag, Content> {
    /// Sender-chosen discriminant, often the sender's rank.
    pub tag: Tag,
    /// The payload.
    pub content: Content,
}

/// A typed point-to-point mailbox.
///
/// Queue ids are agreed across peers by creation order, so construction is
/// collective: every peer must create its queues in the same order, with
/// the same `Tag`/`Content` types per position. A mismatch is detected at
/// delivery time and is fatal.
///
/// Messages sent during superstep `n` (self-sends included) iterate during
/// `n + 1` and are gone by `n + 2`. Per `(sender, queue)` the iteration
/// order is the send order; across senders it is unspecified.
pub struct Queue<Tag: Pod, Content: Pod> {
    world: World,
    id: QueueId,
    _marker: PhantomData<(Tag, Content)>,
}

impl<Tag: Pod, Content: Pod> Queue<Tag, Content> {
    /// Creates the queue on this peer; collective by creation order.
    pub fn new(world: &World) -> Queue<Tag, Content> {
        let id = world
            .engine_mut()
            .create_queue(mem::size_of::<Tag>(), mem::size_of::<Content>());
        Queue {
            world: world.clone(),
            id,
            _marker: PhantomData,
        }
    }

    /// Stages a message for this queue's image at `dst`.
    pub fn send(&self, dst: Pid, tag: Tag, content: Content) -> WorldResult<()> {
        self.world.engine_mut().send(
            dst,
            self.id,
            bytemuck::bytes_of(&tag),
            bytemuck::bytes_of(&content),
        )
    }

    /// Decodes the records delivered by the last sync, in delivery order.
    pub fn messages(&self) -> WorldResult<Vec<Message<Tag, Content>>> {
        let (tag_size, content_size, records) = self.world.engine().delivered(self.id)?;
        let record_size = tag_size + content_size;
        let mut messages = Vec::with_capacity(if record_size == 0 {
            0
        } else {
            records.len() / record_size
        });
        if record_size == 0 {
            return Ok(messages);
        }
        for record in records.chunks_exact(record_size) {
            messages.push(Message {
                tag: bytemuck::pod_read_unaligned(&record[..tag_size]),
                content: bytemuck::pod_read_unaligned(&record[tag_size..]),
            });
        }
        Ok(messages)
    }

    /// The world this queue is registered with.
    pub fn world(&self) -> &World {
        &self.world
    }
}

impl<Tag: Pod, Content: Pod> Drop for Queue<Tag, Content> {
    fn drop(&mut self) {
        // Mirror construction: tear down collectively so ids stay aligned.
        let _ = self.world.barrier();
        let _ = self.world.engine_mut().destroy_queue(self.id);
    }
}
