//! Class definitions from the `AcDb:Classes` section.
//!
//! Object type codes of 500 and above are not fixed: each drawing assigns
//! them through its class table, which maps the number to a DXF name and
//! says whether instances are graphical entities.

use ahash::AHashMap;
use bitflags::bitflags;

bitflags! {
    /// Operations a proxy of this class allows.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProxyFlags: u16 {
        const ERASE_ALLOWED = 0x1;
        const TRANSFORM_ALLOWED = 0x2;
        const COLOR_CHANGE_ALLOWED = 0x4;
        const LAYER_CHANGE_ALLOWED = 0x8;
        const LINETYPE_CHANGE_ALLOWED = 0x10;
        const LINETYPE_SCALE_CHANGE_ALLOWED = 0x20;
        const VISIBILITY_CHANGE_ALLOWED = 0x40;
        const CLONING_ALLOWED = 0x80;
        const LINEWEIGHT_CHANGE_ALLOWED = 0x100;
        const PLOT_STYLE_NAME_CHANGE_ALLOWED = 0x200;
        const DISABLES_PROXY_WARNING_DIALOG = 0x400;
        const IS_R13_FORMAT_PROXY = 0x8000;
    }
}

/// Item class id marking classes whose instances are entities.
pub const ENTITY_ITEM_CLASS_ID: i16 = 0x1F2;

/// One class definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DxfClass {
    pub class_number: i16,
    pub proxy_flags: ProxyFlags,
    pub application_name: String,
    pub cpp_class_name: String,
    pub dxf_name: String,
    pub was_zombie: bool,
    pub item_class_id: i16,
    pub is_an_entity: bool,
    /// Instance count; only stored from 2004 on.
    pub instance_count: i32,
    pub dwg_version: i32,
    pub maintenance_version: i32,
}

/// Class number ↔ DXF name lookup.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    by_number: AHashMap<i16, DxfClass>,
    by_name: AHashMap<String, i16>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a class, replacing any previous definition with the same number.
    pub fn insert(&mut self, class: DxfClass) {
        if let Some(old) = self.by_number.get(&class.class_number) {
            let key = old.dxf_name.to_uppercase();
            if self.by_name.get(&key) == Some(&class.class_number) {
                self.by_name.remove(&key);
            }
        }
        self.by_name
            .insert(class.dxf_name.to_uppercase(), class.class_number);
        self.by_number.insert(class.class_number, class);
    }

    pub fn get(&self, class_number: i16) -> Option<&DxfClass> {
        self.by_number.get(&class_number)
    }

    /// Case-insensitive lookup by DXF name.
    pub fn get_by_name(&self, dxf_name: &str) -> Option<&DxfClass> {
        self.by_name
            .get(&dxf_name.to_uppercase())
            .and_then(|n| self.by_number.get(n))
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }

    /// Classes ordered by class number.
    pub fn iter(&self) -> impl Iterator<Item = &DxfClass> {
        let mut classes: Vec<&DxfClass> = self.by_number.values().collect();
        classes.sort_by_key(|c| c.class_number);
        classes.into_iter()
    }
}

impl FromIterator<DxfClass> for ClassTable {
    fn from_iter<T: IntoIterator<Item = DxfClass>>(iter: T) -> Self {
        let mut table = ClassTable::new();
        for class in iter {
            table.insert(class);
        }
        table
    }
}
