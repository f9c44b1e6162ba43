//! COCO vehicle classes counted by the monitor.

use serde::Serialize;

use crate::Detection;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Car,
        VehicleClass::Motorcycle,
        VehicleClass::Bus,
        VehicleClass::Truck,
    ];

    pub fn from_coco_id(class_id: i64) -> Option<Self> {
        match class_id {
            2 => Some(VehicleClass::Car),
            3 => Some(VehicleClass::Motorcycle),
            5 => Some(VehicleClass::Bus),
            7 => Some(VehicleClass::Truck),
            _ => None,
        }
    }

    pub fn coco_id(self) -> i64 {
        match self {
            VehicleClass::Car => 2,
            VehicleClass::Motorcycle => 3,
            VehicleClass::Bus => 5,
            VehicleClass::Truck => 7,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "truck",
        }
    }
}

/// Detection that matched one of the vehicle classes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VehicleDetection {
    pub class: VehicleClass,
    pub score: f32,
    pub bbox: [f32; 4],
}

/// Keep only vehicle detections; the vehicle count is the length of the result.
pub fn filter_vehicles(detections: &[Detection]) -> Vec<VehicleDetection> {
    detections
        .iter()
        .filter_map(|det| {
            VehicleClass::from_coco_id(det.class_id).map(|class| VehicleDetection {
                class,
                score: det.score,
                bbox: det.bbox,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_ids_round_trip() {
        for class in VehicleClass::ALL {
            assert_eq!(VehicleClass::from_coco_id(class.coco_id()), Some(class));
        }
    }

    #[test]
    fn non_vehicle_ids_are_rejected() {
        // person, bicycle, airplane, train, boat
        for id in [0, 1, 4, 6, 8, 79, -1] {
            assert_eq!(VehicleClass::from_coco_id(id), None);
        }
    }

    #[test]
    fn filter_keeps_vehicles_in_order() {
        let detections = [
            Detection {
                bbox: [0.0, 0.0, 1.0, 1.0],
                score: 0.9,
                class_id: 0,
            },
            Detection {
                bbox: [1.0, 1.0, 2.0, 2.0],
                score: 0.8,
                class_id: 7,
            },
            Detection {
                bbox: [2.0, 2.0, 3.0, 3.0],
                score: 0.7,
                class_id: 2,
            },
        ];
        let vehicles = filter_vehicles(&detections);
        assert_eq!(vehicles.len(), 2);
        assert_eq!(vehicles[0].class, VehicleClass::Truck);
        assert_eq!(vehicles[1].class.label(), "car");
    }
}
