use serde::{Deserialize, Serialize};

/// A bike listed by the shop.
///
/// Every field is optional so that a freshly built bike (no id yet) and a
/// partial server payload both decode. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bike {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl Bike {
    pub fn new(model: impl Into<String>, brand: impl Into<String>) -> Self {
        Self {
            id: None,
            model: Some(model.into()),
            brand: Some(brand.into()),
        }
    }
}
