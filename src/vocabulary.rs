//! COCO taxonomy of the detector and the food subset treated as ingredients.

/// Label index 0 of the detector output; never a real object.
pub const BACKGROUND_LABEL: &str = "__background__";

/// Slots the COCO id space skips. The detector never trains on them.
const UNUSED_SLOT: &str = "N/A";

/// COCO category names in detector label order (torchvision layout, 91 slots).
pub const COCO_CATEGORY_NAMES: &[&str] = &[
    BACKGROUND_LABEL,
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    UNUSED_SLOT,
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    UNUSED_SLOT,
    "backpack",
    "umbrella",
    UNUSED_SLOT,
    UNUSED_SLOT,
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    UNUSED_SLOT,
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    UNUSED_SLOT,
    "dining table",
    UNUSED_SLOT,
    UNUSED_SLOT,
    "toilet",
    UNUSED_SLOT,
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    UNUSED_SLOT,
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// COCO classes that correspond to common ingredients or food containers.
/// Stored lower case.
const INGREDIENT_CLASSES: &[&str] = &[
    "banana",
    "apple",
    "orange",
    "broccoli",
    "carrot",
    "pizza",
    "donut",
    "sandwich",
    "hot dog",
    "bottle",
    "wine glass",
    "cup",
    "bowl",
    "cake",
];

/// Resolve a raw detector label to its category name.
///
/// Returns `None` for the background sentinel, unused slots, and any index
/// outside the taxonomy (including negative ones).
pub fn class_name(class_index: i64) -> Option<&'static str> {
    let idx = usize::try_from(class_index).ok()?;
    match COCO_CATEGORY_NAMES.get(idx) {
        Some(&name) if name != BACKGROUND_LABEL && name != UNUSED_SLOT => Some(name),
        _ => None,
    }
}

/// Lower-case form used for vocabulary lookups and in API output.
pub fn canonicalize(class_name: &str) -> String {
    class_name.trim().to_lowercase()
}

/// Case-insensitive membership test against the ingredient vocabulary.
pub fn is_ingredient(class_name: &str) -> bool {
    let canonical = canonicalize(class_name);
    INGREDIENT_CLASSES.contains(&canonical.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_layout() {
        assert_eq!(COCO_CATEGORY_NAMES.len(), 91);
        assert_eq!(class_name(1), Some("person"));
        assert_eq!(class_name(44), Some("bottle"));
        assert_eq!(class_name(52), Some("banana"));
        assert_eq!(class_name(53), Some("apple"));
        assert_eq!(class_name(90), Some("toothbrush"));
    }

    #[test]
    fn test_sentinels_and_out_of_range() {
        assert_eq!(class_name(0), None);
        assert_eq!(class_name(12), None);
        assert_eq!(class_name(91), None);
        assert_eq!(class_name(-1), None);
        assert_eq!(class_name(i64::MAX), None);
    }

    #[test]
    fn test_is_ingredient_case_insensitive() {
        assert!(is_ingredient("banana"));
        assert!(is_ingredient("Banana"));
        assert!(is_ingredient("HOT DOG"));
        assert!(!is_ingredient("car"));
        assert!(!is_ingredient("refrigerator"));
        assert!(!is_ingredient(BACKGROUND_LABEL));
    }

    #[test]
    fn test_every_ingredient_is_in_taxonomy() {
        for name in INGREDIENT_CLASSES {
            assert!(COCO_CATEGORY_NAMES.contains(name), "{} missing", name);
        }
    }
}
