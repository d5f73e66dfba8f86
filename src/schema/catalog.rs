//! Static column catalogs for the corporate number publication.
//!
//! A [`Layout`] is the single source of truth for positional mapping,
//! header recognition, normalization and schema creation.

use clap::ValueEnum;
use csv::StringRecord;

use super::types::{ColumnDef, ColumnKind};

/// An ordered, fixed column catalog.
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    name: &'static str,
    columns: &'static [ColumnDef],
}

impl Layout {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn columns(&self) -> &'static [ColumnDef] {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, idx: usize) -> &'static ColumnDef {
        &self.columns[idx]
    }

    /// Position of the column called `name` (field key, DB column, label or alias).
    /// A leading BOM, surrounding whitespace and wrapping quotes are ignored.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        let key = crate::process::utils::clean_str(name);
        if key.is_empty() {
            return None;
        }
        self.columns.iter().position(|c| c.answers_to(key))
    }
}

/// Which catalog the input follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LayoutKind {
    /// The 30-item layout of the official download files.
    #[default]
    Published,
    /// A 7-column extract: sequence, number, type, name, address, furigana, established date.
    Compact,
}

impl LayoutKind {
    pub fn layout(self) -> &'static Layout {
        match self {
            LayoutKind::Published => &PUBLISHED,
            LayoutKind::Compact => &COMPACT,
        }
    }

    /// Guess the layout from the first row of a file: its width, or for a
    /// header of some other width, whether it names compact-only columns.
    pub fn for_first_row(first: &StringRecord) -> Option<LayoutKind> {
        if first.len() == COMPACT.len() {
            return Some(LayoutKind::Compact);
        }
        if first.len() == PUBLISHED.len() {
            return Some(LayoutKind::Published);
        }
        first
            .iter()
            .any(|cell| COMPACT.resolve(cell).is_some() && PUBLISHED.resolve(cell).is_none())
            .then_some(LayoutKind::Compact)
    }
}

macro_rules! col {
    ($item:expr, $field:expr, $column:expr, $label:expr, $kind:ident $(, $alias:expr)* $(,)?) => {
        ColumnDef {
            item: $item,
            field: $field,
            column: $column,
            label: $label,
            kind: ColumnKind::$kind,
            aliases: &[$($alias),*],
        }
    };
}

const PUBLISHED_COLUMNS: &[ColumnDef] = &[
    col!(7, "sequenceNumber", "sequence_number", "順序番号", Sequence),
    col!(8, "corporateNumber", "corporate_number", "法人番号", CorporateNumber),
    col!(9, "process", "process", "処理区分", Text),
    col!(10, "correct", "correct", "訂正区分", Text),
    col!(11, "updateDate", "update_date", "更新年月日", Date),
    col!(12, "changeDate", "change_date", "変更年月日", Date),
    col!(13, "name", "company_name", "商号又は名称", Text),
    col!(14, "nameImageId", "name_image_id", "商号又は名称イメージID", Text),
    col!(15, "kind", "kind", "法人種別", Text, "法人種別コード"),
    col!(16, "prefectureName", "prefecture_name", "国内所在地（都道府県）", Text, "都道府県名"),
    col!(17, "cityName", "city_name", "国内所在地（市区町村）", Text, "市区町村名"),
    col!(18, "streetNumber", "street_number", "国内所在地（丁目番地等）", Text, "丁目番地等"),
    col!(19, "addressImageId", "address_image_id", "所在地イメージID", Text),
    col!(20, "prefectureCode", "prefecture_code", "都道府県コード", Text),
    col!(21, "cityCode", "city_code", "市区町村コード", Text),
    col!(22, "postCode", "post_code", "郵便番号", PostalCode),
    col!(23, "addressOutside", "address_outside", "国外所在地", Text),
    col!(24, "addressOutsideImageId", "address_outside_image_id", "国外所在地イメージID", Text),
    col!(25, "closeDate", "close_date", "登記記録の閉鎖等年月日", Date),
    col!(26, "closeCause", "close_cause", "登記記録の閉鎖等の事由", Text),
    col!(27, "successorCorporateNumber", "successor_corporate_number", "承継先法人番号", CorporateNumber),
    col!(28, "changeCause", "change_cause", "変更事由", Text),
    col!(29, "assignmentDate", "assignment_date", "法人番号指定年月日", Date),
    col!(30, "latest", "latest", "最新履歴", Flag, "最新履歴等"),
    col!(31, "enName", "en_name", "商号又は名称（英語表記）", Text),
    col!(32, "enPrefectureName", "en_prefecture_name", "国内所在地（都道府県）（英語表記）", Text, "都道府県名（英語表記）"),
    col!(33, "enCityName", "en_city_name", "国内所在地（市区町村丁目番地等）（英語表記）", Text, "市区町村名（英語表記）"),
    col!(34, "enAddressOutside", "en_address_outside", "国外所在地（英語表記）", Text),
    col!(35, "furigana", "furigana", "フリガナ", Text),
    col!(36, "hihyoji", "hihyoji", "検索対象除外", Text, "非表示理由", "備考"),
];

const COMPACT_COLUMNS: &[ColumnDef] = &[
    col!(7, "sequenceNumber", "sequence_number", "順序番号", Sequence),
    col!(8, "corporateNumber", "corporate_number", "法人番号", CorporateNumber),
    col!(15, "kind", "kind", "法人種別", Text, "法人種別コード"),
    col!(13, "name", "company_name", "商号又は名称", Text),
    col!(0, "address", "address", "所在地", Text, "国内所在地"),
    col!(35, "furigana", "furigana", "フリガナ", Text),
    col!(0, "establishedOn", "established_on", "設立年月日", Date, "established"),
];

pub static PUBLISHED: Layout = Layout {
    name: "published",
    columns: PUBLISHED_COLUMNS,
};

pub static COMPACT: Layout = Layout {
    name: "compact",
    columns: COMPACT_COLUMNS,
};
