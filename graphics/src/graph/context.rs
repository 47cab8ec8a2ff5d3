//! Context handed to pass callbacks.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::resource::{BufferHandle, TextureHandle, TextureSlice};
use super::resource_manager::ResourceManager;
use crate::command::{CommandContext, TextureView};
use crate::resources::{Buffer, Texture};

/// What a pass callback records with.
///
/// Dereferences to the [`CommandContext`] the pass was scheduled on, and
/// resolves the graph handles the callback captured into live resources.
pub struct PassContext<'a> {
    name: &'a str,
    context: &'a mut CommandContext,
    resources: &'a ResourceManager,
}

impl<'a> PassContext<'a> {
    pub(crate) fn new(
        name: &'a str,
        context: &'a mut CommandContext,
        resources: &'a ResourceManager,
    ) -> Self {
        Self {
            name,
            context,
            resources,
        }
    }

    /// Name of the running pass.
    pub fn pass_name(&self) -> &str {
        self.name
    }

    /// Buffer behind `handle`.
    ///
    /// `None` if the handle is stale or the buffer is not alive in this pass.
    pub fn buffer(&self, handle: BufferHandle) -> Option<Arc<Buffer>> {
        self.resources.buffer(handle)
    }

    /// Texture behind `handle`.
    pub fn texture(&self, handle: TextureHandle) -> Option<Arc<Texture>> {
        self.resources.texture(handle)
    }

    /// View of a texture slice, ready for clears and target binding.
    pub fn texture_view(&self, slice: TextureSlice) -> Option<TextureView> {
        let texture = self.texture(slice.texture())?;
        Some(
            TextureView::new(texture)
                .with_mip_level(slice.mip_level())
                .with_array_slice(slice.array_slice()),
        )
    }

    /// The underlying command context.
    pub fn command_context(&mut self) -> &mut CommandContext {
        self.context
    }
}

impl Deref for PassContext<'_> {
    type Target = CommandContext;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl DerefMut for PassContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}
