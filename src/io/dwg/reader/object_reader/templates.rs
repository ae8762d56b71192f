//! Object templates: decoded records whose references are still raw handles.
//!
//! The object graph is cyclic (owners point at children, children point
//! back through owner and reactor handles), so nothing is dereferenced
//! while decoding. Each record becomes an [`ObjectTemplate`] keyed by its
//! handle; a later linking pass resolves the deferred references against
//! the finished [`TemplateSet`].

use indexmap::IndexMap;

use crate::io::dwg::object_type::DwgObjectType;

/// One extended-data block, kept undecoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedDataBlock {
    /// Handle of the APPID that registered the data.
    pub app_handle: u64,
    pub data: Vec<u8>,
}

/// A reference to another object, waiting for the linking pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredReference {
    /// Field the handle belongs to, e.g. `"layer"` or a dictionary entry name.
    pub slot: String,
    pub handle: u64,
}

impl DeferredReference {
    pub fn new(slot: impl Into<String>, handle: u64) -> Self {
        Self {
            slot: slot.into(),
            handle,
        }
    }
}

/// Fields of the entity common prefix that are not references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityData {
    /// BB: 0 = owner handle present, 1 = paper space, 2 = model space
    pub entity_mode: u8,
    pub color_index: i16,
    pub true_color: Option<u32>,
    pub transparency: Option<u32>,
    pub linetype_scale: f64,
    pub invisible: bool,
    pub line_weight: u8,
    /// Proxy graphics, skipped over.
    pub graphics_size: u64,
}

/// Type-specific payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateBody {
    /// Only the common prefix was decoded.
    Placeholder,
    /// DICTIONARY: entry name to item handle, in stored order.
    Dictionary {
        cloning_flags: i16,
        hard_owner: bool,
        entries: Vec<(String, u64)>,
    },
}

/// Decode-time representation of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTemplate {
    /// Handle stored in the record.
    pub handle: u64,
    pub object_type: DwgObjectType,
    /// Raw type code (class number for class-based types).
    pub raw_type: i16,
    pub dxf_name: String,
    pub owner_handle: u64,
    pub reactors: Vec<u64>,
    /// Extension dictionary, when present.
    pub xdictionary: Option<u64>,
    pub extended_data: Vec<ExtendedDataBlock>,
    /// Present for records with the entity common prefix.
    pub entity: Option<EntityData>,
    pub deferred: Vec<DeferredReference>,
    pub body: TemplateBody,
}

impl ObjectTemplate {
    pub fn new(handle: u64, object_type: DwgObjectType, raw_type: i16) -> Self {
        Self {
            handle,
            object_type,
            raw_type,
            dxf_name: object_type.dxf_name().to_string(),
            owner_handle: 0,
            reactors: Vec::new(),
            xdictionary: None,
            extended_data: Vec::new(),
            entity: None,
            deferred: Vec::new(),
            body: TemplateBody::Placeholder,
        }
    }

    pub fn is_entity(&self) -> bool {
        self.entity.is_some()
    }

    /// Every non-null handle this object refers to: owner, reactors,
    /// extension dictionary, extended-data applications and deferred slots.
    pub fn referenced_handles(&self) -> impl Iterator<Item = u64> + '_ {
        std::iter::once(self.owner_handle)
            .chain(self.reactors.iter().copied())
            .chain(self.xdictionary)
            .chain(self.extended_data.iter().map(|e| e.app_handle))
            .chain(self.deferred.iter().map(|d| d.handle))
            .filter(|&h| h != 0)
    }
}

/// A reference whose target was never decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    /// Object holding the reference.
    pub from: u64,
    pub slot: String,
    pub handle: u64,
}

/// Templates keyed by handle, in decode order.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: IndexMap<u64, ObjectTemplate>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: u64, template: ObjectTemplate) {
        self.templates.insert(handle, template);
    }

    pub fn get(&self, handle: u64) -> Option<&ObjectTemplate> {
        self.templates.get(&handle)
    }

    pub fn contains(&self, handle: u64) -> bool {
        self.templates.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Handles in decode order.
    pub fn handles(&self) -> impl Iterator<Item = u64> + '_ {
        self.templates.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectTemplate> {
        self.templates.values()
    }

    /// Deferred references and owners that point outside the set.
    pub fn unresolved(&self) -> Vec<UnresolvedReference> {
        let mut missing = Vec::new();
        for (&from, template) in &self.templates {
            if template.owner_handle != 0 && !self.contains(template.owner_handle) {
                missing.push(UnresolvedReference {
                    from,
                    slot: "owner".to_string(),
                    handle: template.owner_handle,
                });
            }
            for reference in &template.deferred {
                if !self.contains(reference.handle) {
                    missing.push(UnresolvedReference {
                        from,
                        slot: reference.slot.clone(),
                        handle: reference.handle,
                    });
                }
            }
        }
        missing
    }
}

impl IntoIterator for TemplateSet {
    type Item = (u64, ObjectTemplate);
    type IntoIter = indexmap::map::IntoIter<u64, ObjectTemplate>;

    fn into_iter(self) -> Self::IntoIter {
        self.templates.into_iter()
    }
}
