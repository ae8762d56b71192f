//! Fixed object type codes.
//!
//! Codes below 500 are fixed by the format. Codes of 500 and above are
//! assigned per drawing by the class table and surface here as
//! [`DwgObjectType::Unlisted`].

macro_rules! object_types {
    ($( $variant:ident = $code:literal => $name:literal, $entity:literal; )*) => {
        /// Object type tag read at the start of every object record.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i16)]
        pub enum DwgObjectType {
            /// Class-based type resolved through the class table.
            Unlisted = -999,
            $( $variant = $code, )*
        }

        impl DwgObjectType {
            /// Map a raw type code; anything not fixed is `Unlisted`.
            pub fn from_raw(value: i16) -> Self {
                match value {
                    $( $code => Self::$variant, )*
                    _ => Self::Unlisted,
                }
            }

            /// DXF name of the type (`"UNLISTED"` for class-based codes).
            pub fn dxf_name(self) -> &'static str {
                match self {
                    Self::Unlisted => "UNLISTED",
                    $( Self::$variant => $name, )*
                }
            }

            /// Whether records of this type carry the entity common prefix.
            pub fn is_entity(self) -> bool {
                match self {
                    Self::Unlisted => false,
                    $( Self::$variant => $entity, )*
                }
            }
        }
    };
}

object_types! {
    Text = 0x01 => "TEXT", true;
    Attrib = 0x02 => "ATTRIB", true;
    Attdef = 0x03 => "ATTDEF", true;
    Block = 0x04 => "BLOCK", true;
    Endblk = 0x05 => "ENDBLK", true;
    Seqend = 0x06 => "SEQEND", true;
    Insert = 0x07 => "INSERT", true;
    Minsert = 0x08 => "MINSERT", true;
    Vertex2D = 0x0A => "VERTEX_2D", true;
    Vertex3D = 0x0B => "VERTEX_3D", true;
    VertexMesh = 0x0C => "VERTEX_MESH", true;
    VertexPface = 0x0D => "VERTEX_PFACE", true;
    VertexPfaceFace = 0x0E => "VERTEX_PFACE_FACE", true;
    Polyline2D = 0x0F => "POLYLINE_2D", true;
    Polyline3D = 0x10 => "POLYLINE_3D", true;
    Arc = 0x11 => "ARC", true;
    Circle = 0x12 => "CIRCLE", true;
    Line = 0x13 => "LINE", true;
    DimensionOrdinate = 0x14 => "DIMENSION_ORDINATE", true;
    DimensionLinear = 0x15 => "DIMENSION_LINEAR", true;
    DimensionAligned = 0x16 => "DIMENSION_ALIGNED", true;
    DimensionAng3Pt = 0x17 => "DIMENSION_ANG_3PT", true;
    DimensionAng2Ln = 0x18 => "DIMENSION_ANG_2LN", true;
    DimensionRadius = 0x19 => "DIMENSION_RADIUS", true;
    DimensionDiameter = 0x1A => "DIMENSION_DIAMETER", true;
    Point = 0x1B => "POINT", true;
    Face3D = 0x1C => "3DFACE", true;
    PolylinePface = 0x1D => "POLYLINE_PFACE", true;
    PolylineMesh = 0x1E => "POLYLINE_MESH", true;
    Solid = 0x1F => "SOLID", true;
    Trace = 0x20 => "TRACE", true;
    Shape = 0x21 => "SHAPE", true;
    Viewport = 0x22 => "VIEWPORT", true;
    Ellipse = 0x23 => "ELLIPSE", true;
    Spline = 0x24 => "SPLINE", true;
    Region = 0x25 => "REGION", true;
    Solid3D = 0x26 => "3DSOLID", true;
    Body = 0x27 => "BODY", true;
    Ray = 0x28 => "RAY", true;
    Xline = 0x29 => "XLINE", true;
    Dictionary = 0x2A => "DICTIONARY", false;
    OleFrame = 0x2B => "OLEFRAME", true;
    Mtext = 0x2C => "MTEXT", true;
    Leader = 0x2D => "LEADER", true;
    Tolerance = 0x2E => "TOLERANCE", true;
    Mline = 0x2F => "MLINE", true;
    BlockControlObj = 0x30 => "BLOCK_CONTROL", false;
    BlockHeader = 0x31 => "BLOCK_HEADER", false;
    LayerControlObj = 0x32 => "LAYER_CONTROL", false;
    Layer = 0x33 => "LAYER", false;
    StyleControlObj = 0x34 => "STYLE_CONTROL", false;
    Style = 0x35 => "STYLE", false;
    LtypeControlObj = 0x38 => "LTYPE_CONTROL", false;
    Ltype = 0x39 => "LTYPE", false;
    ViewControlObj = 0x3C => "VIEW_CONTROL", false;
    View = 0x3D => "VIEW", false;
    UcsControlObj = 0x3E => "UCS_CONTROL", false;
    Ucs = 0x3F => "UCS", false;
    VportControlObj = 0x40 => "VPORT_CONTROL", false;
    Vport = 0x41 => "VPORT", false;
    AppidControlObj = 0x42 => "APPID_CONTROL", false;
    Appid = 0x43 => "APPID", false;
    DimstyleControlObj = 0x44 => "DIMSTYLE_CONTROL", false;
    Dimstyle = 0x45 => "DIMSTYLE", false;
    VpEntHdrCtrlObj = 0x46 => "VP_ENT_HDR_CONTROL", false;
    VpEntHdr = 0x47 => "VP_ENT_HDR", false;
    Group = 0x48 => "GROUP", false;
    MlineStyle = 0x49 => "MLINESTYLE", false;
    Ole2Frame = 0x4A => "OLE2FRAME", true;
    Dummy = 0x4B => "DUMMY", false;
    LongTransaction = 0x4C => "LONG_TRANSACTION", false;
    LwPolyline = 0x4D => "LWPOLYLINE", true;
    Hatch = 0x4E => "HATCH", true;
    XRecord = 0x4F => "XRECORD", false;
    AcDbPlaceholder = 0x50 => "ACDBPLACEHOLDER", false;
    VbaProject = 0x51 => "VBA_PROJECT", false;
    Layout = 0x52 => "LAYOUT", false;
    AcadProxyEntity = 0x1F2 => "ACAD_PROXY_ENTITY", true;
    AcadProxyObject = 0x1F3 => "ACAD_PROXY_OBJECT", false;
}

impl DwgObjectType {
    pub fn as_raw(self) -> i16 {
        self as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_known() {
        assert_eq!(DwgObjectType::from_raw(0x13), DwgObjectType::Line);
        assert_eq!(DwgObjectType::from_raw(0x2A), DwgObjectType::Dictionary);
        assert_eq!(DwgObjectType::from_raw(0x1F3), DwgObjectType::AcadProxyObject);
    }

    #[test]
    fn test_class_codes_are_unlisted() {
        assert_eq!(DwgObjectType::from_raw(500), DwgObjectType::Unlisted);
        assert_eq!(DwgObjectType::from_raw(0x36), DwgObjectType::Unlisted);
    }

    #[test]
    fn test_names_and_entity_flag() {
        assert_eq!(DwgObjectType::Dictionary.dxf_name(), "DICTIONARY");
        assert!(DwgObjectType::Line.is_entity());
        assert!(!DwgObjectType::Layer.is_entity());
        assert_eq!(DwgObjectType::LwPolyline.as_raw(), 0x4D);
    }
}
