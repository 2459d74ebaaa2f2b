//! Access to the user group of a users.cfg document.
//!
//! The relevant shape is:
//!
//! ```xml
//! <list name="User">
//!   <listitem>
//!     <variable name="Domain">acme.test</variable>
//!     <variable name="Name">alice</variable>
//!     <variable name="Password">D3S:...</variable>
//!   </listitem>
//! </list>
//! ```
//!
//! Elements are always located by their `name` attribute, never by position.

use std::collections::HashMap;

use tracing::debug;

use crate::document::{Document, Element};
use crate::errors::DocumentError;
use crate::models::{AccountKey, UserRecord};

pub const LIST_TAG: &str = "list";
pub const ITEM_TAG: &str = "listitem";
pub const VARIABLE_TAG: &str = "variable";
pub const NAME_ATTR: &str = "name";

pub const USER_GROUP: &str = "User";
pub const DOMAIN_FIELD: &str = "Domain";
pub const NAME_FIELD: &str = "Name";
pub const PASSWORD_FIELD: &str = "Password";

/// Account excluded from updates when admin skipping is on.
pub const ADMIN_ACCOUNT: &str = "Admin";

fn is_user_group(el: &Element) -> bool {
    el.name() == LIST_TAG && el.attribute(NAME_ATTR) == Some(USER_GROUP)
}

fn is_item(el: &Element) -> bool {
    el.name() == ITEM_TAG
}

/// All user items of the document, in document order.
///
/// Items of every `<list name="User">` are returned; a document without any
/// such list is malformed.
pub fn user_items(doc: &Document) -> Result<Vec<&Element>, DocumentError> {
    let groups = doc.root().select(&is_user_group);
    if groups.is_empty() {
        return Err(DocumentError::MissingUserGroup);
    }
    let items: Vec<&Element> = groups
        .into_iter()
        .flat_map(|group| group.child_elements().filter(|el| is_item(el)))
        .collect();
    debug!(count = items.len(), "enumerated user items");
    Ok(items)
}

/// Mutable counterpart of [`user_items`].
pub fn user_items_mut(doc: &mut Document) -> Result<Vec<&mut Element>, DocumentError> {
    let groups = doc.root_mut().select_mut(&is_user_group);
    if groups.is_empty() {
        return Err(DocumentError::MissingUserGroup);
    }
    Ok(groups
        .into_iter()
        .flat_map(|group| group.child_elements_mut().filter(|el| is_item(el)))
        .collect())
}

fn variable<'a>(item: &'a Element, name: &str) -> Option<&'a Element> {
    item.find(&|el| el.name() == VARIABLE_TAG && el.attribute(NAME_ATTR) == Some(name))
}

/// Unescaped text of the first `<variable name="{field}">` in `item`.
pub fn field_value(item: &Element, name: &str) -> Option<String> {
    variable(item, name).map(Element::text)
}

fn required(item: &Element, index: usize, name: &str) -> Result<String, DocumentError> {
    field_value(item, name).ok_or_else(|| DocumentError::MissingField {
        item: index + 1,
        field: name.to_string(),
    })
}

/// (Domain, Name) of the item at zero-based position `index`.
pub fn account_key(item: &Element, index: usize) -> Result<AccountKey, DocumentError> {
    Ok(AccountKey::new(
        required(item, index, DOMAIN_FIELD)?,
        required(item, index, NAME_FIELD)?,
    ))
}

/// Full record of the item at zero-based position `index`.
pub fn read_record(item: &Element, index: usize) -> Result<UserRecord, DocumentError> {
    let key = account_key(item, index)?;
    Ok(UserRecord {
        domain: key.domain,
        name: key.name,
        password: required(item, index, PASSWORD_FIELD)?,
    })
}

/// Set the item's password. Returns `false` when it already had that value,
/// in which case the markup is left untouched.
pub fn set_password(
    item: &mut Element,
    index: usize,
    password: &str,
) -> Result<bool, DocumentError> {
    let target = item
        .find_mut(&|el| {
            el.name() == VARIABLE_TAG && el.attribute(NAME_ATTR) == Some(PASSWORD_FIELD)
        })
        .ok_or_else(|| DocumentError::MissingField {
            item: index + 1,
            field: PASSWORD_FIELD.to_string(),
        })?;
    if target.text() == password {
        return Ok(false);
    }
    target.set_text(password);
    Ok(true)
}

/// Lookup of a document's user items by (domain, name).
///
/// When a key occurs more than once, the first item in document order wins.
pub struct UserIndex<'a> {
    items: HashMap<AccountKey, (usize, &'a Element)>,
}

impl<'a> UserIndex<'a> {
    pub fn build(doc: &'a Document) -> Result<Self, DocumentError> {
        let list = user_items(doc)?;
        let mut items = HashMap::with_capacity(list.len());
        for (index, item) in list.into_iter().enumerate() {
            let key = account_key(item, index)?;
            items.entry(key).or_insert((index, item));
        }
        debug!(accounts = items.len(), "built user index");
        Ok(Self { items })
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Record for `key`, or `None` if the document has no such account.
    ///
    /// Fails if the matching item has no `Password` variable.
    pub fn resolve(&self, key: &AccountKey) -> Result<Option<UserRecord>, DocumentError> {
        match self.items.get(key) {
            Some(&(index, item)) => read_record(item, index).map(Some),
            None => Ok(None),
        }
    }
}
