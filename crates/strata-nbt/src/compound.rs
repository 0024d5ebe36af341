use crate::Tag;
use strata_common::{Result, StrataError};

/// Named children of a compound tag.
///
/// Children keep their insertion order so files are written back the way they
/// were read, but lookups only care about names: the first child with a given
/// name wins, and two compounds are equal when each name holds the same children,
/// in the same order, in both.
#[derive(Debug, Clone, Default)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(name, tag)| (name.as_str(), tag))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, tag)| tag)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, tag)| tag)
    }

    /// Replaces the first child called `name`, or appends one. Returns the
    /// replaced tag.
    pub fn set(&mut self, name: impl Into<String>, tag: Tag) -> Option<Tag> {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => Some(std::mem::replace(slot, tag)),
            None => {
                self.entries.push((name, tag));
                None
            }
        }
    }

    /// Appends a child without looking for an existing one of the same name.
    pub fn push(&mut self, name: impl Into<String>, tag: Tag) {
        self.entries.push((name.into(), tag));
    }

    /// Removes the first child called `name`.
    pub fn remove(&mut self, name: &str) -> Option<Tag> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns the child called `name`, failing with `MissingTag` if absent.
    pub fn require(&self, name: &str) -> Result<&Tag> {
        self.get(name).ok_or_else(|| StrataError::missing(name))
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: &'static str,
        extract: impl FnOnce(&'a Tag) -> Option<T>,
    ) -> Result<T> {
        let tag = self.require(name)?;
        extract(tag).ok_or_else(|| StrataError::WrongType {
            name: name.to_owned(),
            expected,
            got: tag.type_name(),
        })
    }

    fn typed_opt<'a, T>(
        &'a self,
        name: &str,
        expected: &'static str,
        extract: impl FnOnce(&'a Tag) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.get(name) {
            None => Ok(None),
            Some(_) => self.typed(name, expected, extract).map(Some),
        }
    }

    pub fn get_byte(&self, name: &str) -> Result<i8> {
        self.typed(name, "TAG_Byte", Tag::as_i8)
    }

    pub fn get_short(&self, name: &str) -> Result<i16> {
        self.typed(name, "TAG_Short", Tag::as_i16)
    }

    pub fn get_int(&self, name: &str) -> Result<i32> {
        self.typed(name, "TAG_Int", Tag::as_i32)
    }

    pub fn get_long(&self, name: &str) -> Result<i64> {
        self.typed(name, "TAG_Long", Tag::as_i64)
    }

    pub fn get_string(&self, name: &str) -> Result<&str> {
        self.typed(name, "TAG_String", |tag| tag.as_string().map(String::as_str))
    }

    pub fn get_byte_array(&self, name: &str) -> Result<&[i8]> {
        self.typed(name, "TAG_Byte_Array", Tag::as_byte_array)
    }

    pub fn get_int_array(&self, name: &str) -> Result<&[i32]> {
        self.typed(name, "TAG_Int_Array", Tag::as_int_array)
    }

    pub fn get_list(&self, name: &str) -> Result<&[Tag]> {
        self.typed(name, "TAG_List", |tag| tag.as_list().map(Vec::as_slice))
    }

    pub fn get_compound(&self, name: &str) -> Result<&Compound> {
        self.typed(name, "TAG_Compound", Tag::as_compound)
    }

    /// Like [`Self::get_byte_array`], but an absent child is `None` rather
    /// than an error.
    pub fn get_byte_array_opt(&self, name: &str) -> Result<Option<&[i8]>> {
        self.typed_opt(name, "TAG_Byte_Array", Tag::as_byte_array)
    }

    pub fn get_list_opt(&self, name: &str) -> Result<Option<&[Tag]>> {
        self.typed_opt(name, "TAG_List", |tag| tag.as_list().map(Vec::as_slice))
    }
}

impl Compound {
    fn all_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, tag)| tag)
    }
}

impl PartialEq for Compound {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, _)| self.all_named(name).eq(other.all_named(name)))
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Compound {
    type Item = (String, Tag);
    type IntoIter = std::vec::IntoIter<(String, Tag)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
