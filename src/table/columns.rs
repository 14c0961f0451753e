use crate::model::QuantityRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// A column of the quantity table. The first four are fixed, one `Level`
/// column follows per level name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Name,
    ElementType,
    Total,
    Quantity,
    Level(String),
}

impl Column {
    pub const FIXED: [Column; 4] = [
        Column::Name,
        Column::ElementType,
        Column::Total,
        Column::Quantity,
    ];

    #[must_use]
    pub fn header(&self) -> &str {
        match self {
            Self::Name => "Name",
            Self::ElementType => "Element Type",
            Self::Total => "Total",
            Self::Quantity => "Quantity",
            Self::Level(name) => name,
        }
    }

    /// Width in terminal cells.
    #[must_use]
    pub fn width(&self) -> u16 {
        match self {
            Self::Name => 30,
            Self::ElementType => 18,
            Self::Total => 10,
            Self::Quantity => 14,
            Self::Level(_) => 10,
        }
    }

    #[must_use]
    pub fn align(&self) -> Align {
        match self {
            Self::Name | Self::ElementType => Align::Left,
            _ => Align::Center,
        }
    }

    #[must_use]
    pub fn level(&self) -> Option<&str> {
        match self {
            Self::Level(name) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn cell(&self, row: &QuantityRow) -> String {
        match self {
            Self::Name => row.name.clone(),
            Self::ElementType => row.element_type.clone(),
            Self::Total => row.total.to_string(),
            Self::Quantity => format_quantity(row),
            Self::Level(level) => row.levels.count(level).to_string(),
        }
    }
}

/// Volume in m³ when present, otherwise length in m, otherwise `0`.
#[must_use]
pub fn format_quantity(row: &QuantityRow) -> String {
    if row.volume > 0.0 {
        format!("{} m³", row.volume)
    } else if row.length > 0.0 {
        format!("{} m", row.length)
    } else {
        "0".to_string()
    }
}
