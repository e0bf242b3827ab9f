// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compile-time field tables for replicated roots.

use super::SyncRoot;
use crate::ser::{Deserializer, SerResult, Serializer, WireValue};
use std::fmt;

type EncodeFn<R> = Box<dyn Fn(&R, &mut Serializer) -> SerResult<()> + Send + Sync>;
type DecodeFn<R> = Box<dyn Fn(&mut R, &mut Deserializer) -> SerResult<()> + Send + Sync>;

struct FieldSpec<R> {
    name: &'static str,
    encode: EncodeFn<R>,
    decode: DecodeFn<R>,
}

/// Ordered list of the replicated fields of `R`.
///
/// Field ids are assigned in declaration order starting at 0, so both peers
/// must describe a root type identically.
pub struct FieldTable<R> {
    fields: Vec<FieldSpec<R>>,
}

impl<R: SyncRoot> FieldTable<R> {
    pub(crate) fn build() -> Self {
        let mut table = Self { fields: Vec::new() };
        R::describe(&mut table);
        table
    }
}

impl<R: 'static> FieldTable<R> {
    /// Declare a field stored as a plain [`WireValue`].
    pub fn value<V: WireValue>(
        &mut self,
        name: &'static str,
        get: fn(&R) -> &V,
        get_mut: fn(&mut R) -> &mut V,
    ) -> &mut Self {
        self.field(
            name,
            move |root, w| get(root).write_to(w),
            move |root, r| {
                *get_mut(root) = V::read_from(r)?;
                Ok(())
            },
        )
    }

    /// Declare a field with custom encode/decode functions.
    pub fn field<E, D>(&mut self, name: &'static str, encode: E, decode: D) -> &mut Self
    where
        E: Fn(&R, &mut Serializer) -> SerResult<()> + Send + Sync + 'static,
        D: Fn(&mut R, &mut Deserializer) -> SerResult<()> + Send + Sync + 'static,
    {
        debug_assert!(
            self.fields.len() < usize::from(u16::MAX),
            "too many replicated fields"
        );
        self.fields.push(FieldSpec {
            name,
            encode: Box::new(encode),
            decode: Box::new(decode),
        });
        self
    }
}

impl<R> FieldTable<R> {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn name(&self, id: u16) -> Option<&'static str> {
        self.fields.get(usize::from(id)).map(|f| f.name)
    }

    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .and_then(|i| u16::try_from(i).ok())
    }

    /// Field ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = u16> {
        (0..self.fields.len()).filter_map(|i| u16::try_from(i).ok())
    }

    /// `None` if `id` is out of range.
    pub(crate) fn encode(&self, id: u16, root: &R, w: &mut Serializer) -> Option<SerResult<()>> {
        self.fields
            .get(usize::from(id))
            .map(|field| (field.encode)(root, w))
    }

    /// `None` if `id` is out of range.
    pub(crate) fn decode(
        &self,
        id: u16,
        root: &mut R,
        r: &mut Deserializer,
    ) -> Option<SerResult<()>> {
        self.fields
            .get(usize::from(id))
            .map(|field| (field.decode)(root, r))
    }
}

impl<R> fmt::Debug for FieldTable<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fields.iter().map(|field| field.name))
            .finish()
    }
}
