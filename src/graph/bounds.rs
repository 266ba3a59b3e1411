// graph/bounds.rs — Spatial bounds policy and its host-property surface
//
// Bounds are stored once per graph and let the driver skip whole blocks
// outside a slab or box without evaluating the program. The property
// surface mirrors the flat `bounds/...` paths a host inspector binds to;
// which paths exist depends on the current variant.

use crate::math::Vec3i;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Bounds {
    None,
    /// Everything below `min_y` and above `max_y` is uniform.
    Vertical {
        min_y: i32,
        max_y: i32,
        sdf_below: f32,
        sdf_above: f32,
        type_below: u64,
        type_above: u64,
    },
    /// Everything outside `[min, max)` is one uniform value. A single
    /// outside pair only — the vertical variant's second pair has no
    /// counterpart here.
    Box {
        min: Vec3i,
        max: Vec3i,
        sdf_outside: f32,
        type_outside: u64,
    },
}

/// Discriminant used by the `bounds/type` property.
const BOUNDS_TYPE_NONE: i64 = 0;
const BOUNDS_TYPE_VERTICAL: i64 = 1;
const BOUNDS_TYPE_BOX: i64 = 2;

/// Value transported through the property surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Float(f32),
}

impl PropertyValue {
    fn as_i64(self) -> i64 {
        match self {
            PropertyValue::Int(v) => v,
            PropertyValue::Float(v) => v as i64,
        }
    }

    fn as_f32(self) -> f32 {
        match self {
            PropertyValue::Int(v) => v as f32,
            PropertyValue::Float(v) => v,
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::None
    }
}

impl Bounds {
    /// Property paths exposed for the current variant.
    pub fn property_list(&self) -> Vec<&'static str> {
        let mut list = vec!["bounds/type"];
        match self {
            Bounds::None => {}
            Bounds::Vertical { .. } => {
                list.extend([
                    "bounds/min_y",
                    "bounds/max_y",
                    "bounds/top_sdf_value",
                    "bounds/bottom_sdf_value",
                    "bounds/top_type_value",
                    "bounds/bottom_type_value",
                ]);
            }
            Bounds::Box { .. } => {
                list.extend([
                    "bounds/min_x",
                    "bounds/min_y",
                    "bounds/min_z",
                    "bounds/max_x",
                    "bounds/max_y",
                    "bounds/max_z",
                    "bounds/sdf_value",
                    "bounds/type_value",
                ]);
            }
        }
        list
    }

    pub fn get_property(&self, path: &str) -> Option<PropertyValue> {
        let sub = path.strip_prefix("bounds/")?;
        if sub == "type" {
            return Some(PropertyValue::Int(match self {
                Bounds::None => BOUNDS_TYPE_NONE,
                Bounds::Vertical { .. } => BOUNDS_TYPE_VERTICAL,
                Bounds::Box { .. } => BOUNDS_TYPE_BOX,
            }));
        }
        match self {
            Bounds::None => None,
            Bounds::Vertical {
                min_y,
                max_y,
                sdf_below,
                sdf_above,
                type_below,
                type_above,
            } => match sub {
                "min_y" => Some(PropertyValue::Int(*min_y as i64)),
                "max_y" => Some(PropertyValue::Int(*max_y as i64)),
                "top_sdf_value" => Some(PropertyValue::Float(*sdf_above)),
                "bottom_sdf_value" | "sdf_value" => Some(PropertyValue::Float(*sdf_below)),
                "top_type_value" => Some(PropertyValue::Int(*type_above as i64)),
                "bottom_type_value" | "type_value" => Some(PropertyValue::Int(*type_below as i64)),
                _ => None,
            },
            Bounds::Box {
                min,
                max,
                sdf_outside,
                type_outside,
            } => match sub {
                "min_x" => Some(PropertyValue::Int(min.x as i64)),
                "min_y" => Some(PropertyValue::Int(min.y as i64)),
                "min_z" => Some(PropertyValue::Int(min.z as i64)),
                "max_x" => Some(PropertyValue::Int(max.x as i64)),
                "max_y" => Some(PropertyValue::Int(max.y as i64)),
                "max_z" => Some(PropertyValue::Int(max.z as i64)),
                "sdf_value" => Some(PropertyValue::Float(*sdf_outside)),
                "type_value" => Some(PropertyValue::Int(*type_outside as i64)),
                _ => None,
            },
        }
    }

    /// Set one property. Returns false for unknown paths; `bounds/type`
    /// switches the variant, filling defaults. Box corners are re-sorted so
    /// min stays the component-wise minimum.
    pub fn set_property(&mut self, path: &str, value: PropertyValue) -> bool {
        let sub = match path.strip_prefix("bounds/") {
            Some(s) => s,
            None => return false,
        };

        if sub == "type" {
            *self = match value.as_i64() {
                BOUNDS_TYPE_NONE => Bounds::None,
                BOUNDS_TYPE_VERTICAL => Bounds::Vertical {
                    min_y: -128,
                    max_y: 128,
                    sdf_below: -1.0,
                    sdf_above: 1.0,
                    type_below: 0,
                    type_above: 0,
                },
                BOUNDS_TYPE_BOX => Bounds::Box {
                    min: Vec3i::splat(-128),
                    max: Vec3i::splat(128),
                    sdf_outside: 1.0,
                    type_outside: 0,
                },
                _ => return false,
            };
            return true;
        }

        match self {
            Bounds::None => false,
            Bounds::Vertical {
                min_y,
                max_y,
                sdf_below,
                sdf_above,
                type_below,
                type_above,
            } => match sub {
                "min_y" => {
                    *min_y = value.as_i64() as i32;
                    if min_y > max_y {
                        std::mem::swap(min_y, max_y);
                    }
                    true
                }
                "max_y" => {
                    *max_y = value.as_i64() as i32;
                    if min_y > max_y {
                        std::mem::swap(min_y, max_y);
                    }
                    true
                }
                "top_sdf_value" => {
                    *sdf_above = value.as_f32();
                    true
                }
                "bottom_sdf_value" | "sdf_value" => {
                    *sdf_below = value.as_f32();
                    true
                }
                "top_type_value" => {
                    *type_above = value.as_i64() as u64;
                    true
                }
                "bottom_type_value" | "type_value" => {
                    *type_below = value.as_i64() as u64;
                    true
                }
                _ => false,
            },
            Bounds::Box {
                min,
                max,
                sdf_outside,
                type_outside,
            } => {
                let updated = match sub {
                    "min_x" => {
                        min.x = value.as_i64() as i32;
                        true
                    }
                    "min_y" => {
                        min.y = value.as_i64() as i32;
                        true
                    }
                    "min_z" => {
                        min.z = value.as_i64() as i32;
                        true
                    }
                    "max_x" => {
                        max.x = value.as_i64() as i32;
                        true
                    }
                    "max_y" => {
                        max.y = value.as_i64() as i32;
                        true
                    }
                    "max_z" => {
                        max.z = value.as_i64() as i32;
                        true
                    }
                    "sdf_value" => {
                        *sdf_outside = value.as_f32();
                        return true;
                    }
                    "type_value" => {
                        *type_outside = value.as_i64() as u64;
                        return true;
                    }
                    _ => return false,
                };
                if updated {
                    Vec3i::sort_min_max(min, max);
                }
                updated
            }
        }
    }
}
