use serde::{Deserialize, Serialize};

/// The seven fields every normalized feed row is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    PrivateId,
    Name,
    ShortDescription,
    Brand,
    Ean,
    Price,
    ProductType,
}

impl CanonicalField {
    pub const ALL: [Self; 7] = [
        Self::PrivateId,
        Self::Name,
        Self::ShortDescription,
        Self::Brand,
        Self::Ean,
        Self::Price,
        Self::ProductType,
    ];

    /// Column token used by shop descriptors for this field.
    pub const fn token(self) -> &'static str {
        match self {
            Self::PrivateId => "privateid",
            Self::Name => "name",
            Self::ShortDescription => "shortdescription",
            Self::Brand => "brand",
            Self::Ean => "ean",
            Self::Price => "price",
            Self::ProductType => "type",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.token() == token)
    }
}

/// Product row in canonical shape. Fields missing from the source feed stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    #[serde(rename = "privateid")]
    pub private_id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "shortdescription")]
    pub short_description: Option<String>,
    pub brand: Option<String>,
    pub ean: Option<String>,
    pub price: Option<String>,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
}

impl CanonicalProduct {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set(&mut self, field: CanonicalField, value: Option<String>) {
        *self.slot_mut(field) = value;
    }

    /// Price as a number, see [`parse_price`].
    pub fn price_value(&self) -> Option<f64> {
        self.price.as_deref().and_then(parse_price)
    }

    const fn slot(&self, field: CanonicalField) -> &Option<String> {
        match field {
            CanonicalField::PrivateId => &self.private_id,
            CanonicalField::Name => &self.name,
            CanonicalField::ShortDescription => &self.short_description,
            CanonicalField::Brand => &self.brand,
            CanonicalField::Ean => &self.ean,
            CanonicalField::Price => &self.price,
            CanonicalField::ProductType => &self.product_type,
        }
    }

    fn slot_mut(&mut self, field: CanonicalField) -> &mut Option<String> {
        match field {
            CanonicalField::PrivateId => &mut self.private_id,
            CanonicalField::Name => &mut self.name,
            CanonicalField::ShortDescription => &mut self.short_description,
            CanonicalField::Brand => &mut self.brand,
            CanonicalField::Ean => &mut self.ean,
            CanonicalField::Price => &mut self.price,
            CanonicalField::ProductType => &mut self.product_type,
        }
    }
}

/// Parse the price formats shops put into feeds.
///
/// German notation (`1.234,56`) is converted to a decimal point and a trailing
/// ` EUR` is dropped. Anything else that does not parse yields `None`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let mut price = raw.trim().to_string();
    if price.contains(',') {
        if price.contains('.') {
            price = price.replace('.', "");
        }
        price = price.replace(',', ".");
    }
    if let Some(stripped) = price.strip_suffix(" EUR") {
        price = stripped.to_string();
    }

    price.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}
