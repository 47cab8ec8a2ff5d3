//! Pipeline objects and shader parameter tables.
//!
//! Both come from the asset layer already compiled and reflected; this module
//! only describes what the command context needs to bind them: which slots a
//! pipeline declares and which resources a draw supplies for them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::resources::{Buffer, Texture};
use crate::types::{PrimitiveTopology, PropertyId};

/// Identity of a compiled pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId(pub u64);

/// Which kind of work a pipeline performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Rasterization pipeline.
    Graphics,
    /// Compute pipeline.
    Compute,
}

/// A resource slot declared by a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderSlot {
    /// Property the slot is bound from.
    pub id: PropertyId,
    /// Register index within the pipeline layout.
    pub register: u32,
    /// Whether the shader writes through this slot.
    pub writable: bool,
}

/// A compiled pipeline with its reflected slots.
///
/// # Example
///
/// ```
/// use ember_graphics::{Pipeline, PipelineId, PropertyId};
///
/// let blur = Pipeline::compute(PipelineId(7), "Blur")
///     .with_texture(PropertyId(1), 0)
///     .with_rw_texture(PropertyId(2), 1);
/// assert_eq!(blur.texture_slots().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    id: PipelineId,
    name: String,
    kind: PipelineKind,
    topology: PrimitiveTopology,
    textures: Vec<ShaderSlot>,
    buffers: Vec<ShaderSlot>,
}

impl Pipeline {
    /// Create a graphics pipeline with no slots.
    pub fn graphics(id: PipelineId, name: impl Into<String>) -> Self {
        Self::new(id, name.into(), PipelineKind::Graphics)
    }

    /// Create a compute pipeline with no slots.
    pub fn compute(id: PipelineId, name: impl Into<String>) -> Self {
        Self::new(id, name.into(), PipelineKind::Compute)
    }

    fn new(id: PipelineId, name: String, kind: PipelineKind) -> Self {
        Self {
            id,
            name,
            kind,
            topology: PrimitiveTopology::TriangleList,
            textures: Vec::new(),
            buffers: Vec::new(),
        }
    }

    /// Set the primitive topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Declare a read-only texture slot.
    pub fn with_texture(mut self, id: PropertyId, register: u32) -> Self {
        self.textures.push(ShaderSlot {
            id,
            register,
            writable: false,
        });
        self
    }

    /// Declare a read-write texture slot.
    pub fn with_rw_texture(mut self, id: PropertyId, register: u32) -> Self {
        self.textures.push(ShaderSlot {
            id,
            register,
            writable: true,
        });
        self
    }

    /// Declare a read-only buffer slot.
    pub fn with_buffer(mut self, id: PropertyId, register: u32) -> Self {
        self.buffers.push(ShaderSlot {
            id,
            register,
            writable: false,
        });
        self
    }

    /// Declare a read-write buffer slot.
    pub fn with_rw_buffer(mut self, id: PropertyId, register: u32) -> Self {
        self.buffers.push(ShaderSlot {
            id,
            register,
            writable: true,
        });
        self
    }

    /// Pipeline identity.
    pub fn id(&self) -> PipelineId {
        self.id
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pipeline kind.
    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Primitive topology used by draws.
    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// Declared texture slots.
    pub fn texture_slots(&self) -> &[ShaderSlot] {
        &self.textures
    }

    /// Declared buffer slots.
    pub fn buffer_slots(&self) -> &[ShaderSlot] {
        &self.buffers
    }
}

/// Per-draw resource overrides supplied by a material or pass.
///
/// These win over everything set globally on the command context.
#[derive(Debug, Clone, Default)]
pub struct ShaderParameters {
    textures: HashMap<PropertyId, Arc<Texture>>,
    buffers: HashMap<PropertyId, Arc<Buffer>>,
}

impl ShaderParameters {
    /// Create an empty parameter table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a texture override.
    pub fn with_texture(mut self, id: PropertyId, texture: Arc<Texture>) -> Self {
        self.textures.insert(id, texture);
        self
    }

    /// Add a buffer override.
    pub fn with_buffer(mut self, id: PropertyId, buffer: Arc<Buffer>) -> Self {
        self.buffers.insert(id, buffer);
        self
    }

    /// Set a texture override.
    pub fn set_texture(&mut self, id: PropertyId, texture: Arc<Texture>) {
        self.textures.insert(id, texture);
    }

    /// Set a buffer override.
    pub fn set_buffer(&mut self, id: PropertyId, buffer: Arc<Buffer>) {
        self.buffers.insert(id, buffer);
    }

    /// Look up a texture override.
    pub fn texture(&self, id: PropertyId) -> Option<&Arc<Texture>> {
        self.textures.get(&id)
    }

    /// Look up a buffer override.
    pub fn buffer(&self, id: PropertyId) -> Option<&Arc<Buffer>> {
        self.buffers.get(&id)
    }
}
