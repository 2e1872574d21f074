//! Authors and categories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Author {
    pub fn new(name: impl Into<String>, bio: Option<String>) -> Self {
        let name = name.into();
        Self { id: Uuid::now_v7(), slug: slugify(&name), name, bio, created_at: Utc::now() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: impl Into<String>, description: Option<String>, parent_id: Option<Uuid>) -> Self {
        let name = name.into();
        Self { id: Uuid::now_v7(), slug: slugify(&name), name, description, parent_id, created_at: Utc::now() }
    }
}

const DIACRITIC_FOLDS: [(&str, char); 7] = [
    ("áàảãạăắằẳẵặâấầẩẫậ", 'a'),
    ("đ", 'd'),
    ("éèẻẽẹêếềểễệ", 'e'),
    ("íìỉĩị", 'i'),
    ("óòỏõọôốồổỗộơớờởỡợ", 'o'),
    ("úùủũụưứừửữự", 'u'),
    ("ýỳỷỹỵ", 'y'),
];

fn fold(c: char) -> char {
    DIACRITIC_FOLDS.iter().find(|(set, _)| set.contains(c)).map_or(c, |(_, base)| *base)
}

/// URL slug with Vietnamese diacritics folded to ASCII: `Sách Thiếu Nhi` -> `sach-thieu-nhi`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.to_lowercase().chars().map(fold) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Sách Thiếu Nhi"), "sach-thieu-nhi");
        assert_eq!(slugify("  Đắc Nhân Tâm!! "), "dac-nhan-tam");
        assert_eq!(slugify("Tuổi Trẻ Đáng Giá Bao Nhiêu?"), "tuoi-tre-dang-gia-bao-nhieu");
    }
    #[test]
    fn test_category_slug() {
        let c = Category::new("Văn học Việt Nam", None, None);
        assert_eq!(c.slug, "van-hoc-viet-nam");
        assert_eq!(Author::new("Nguyễn Nhật Ánh", None).slug, "nguyen-nhat-anh");
    }
}
