use std::sync::Arc;

use anyhow::Result;
use lazy_static::lazy_static;

use crate::common::{PageId, RecordId, Slot, INVALID_PAGE_ID, PAGE_SIZE};
use crate::concurrency::TransactionId;
use crate::error::DbError;
use crate::storage::utils::{Deserializer, Serializer};
use crate::tuple::schema::Schema;
use crate::tuple::Tuple;

lazy_static! {
    static ref EMPTY_SCHEMA: Arc<Schema> = Arc::new(Schema::default());
}

/// Number of tuple slots that fit on a page, each slot costs its tuple size plus one header bit
pub fn num_slots(schema: &Schema) -> usize {
    let tuple_size = schema.tuple_size();
    if tuple_size == 0 {
        return 0;
    }
    (PAGE_SIZE * 8) / (tuple_size * 8 + 1)
}

/// Number of bytes of the occupancy bitmap
pub fn header_size(schema: &Schema) -> usize {
    num_slots(schema).div_ceil(8)
}

/// A fixed size page of a heap file.
///
/// The page starts with a bitmap with one bit per slot (bit `i` is set if slot `i` is used),
/// followed by `num_slots` fixed size tuple slots. Remaining bytes are zero.
#[derive(Debug)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    /// Decodes a page from its on-disk bytes
    pub fn new(page_id: PageId, schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        if data.len() < PAGE_SIZE {
            return Err(DbError::ShortRead {
                page_id,
                read: data.len(),
                expected: PAGE_SIZE,
            }
            .into());
        }

        let slots = num_slots(&schema);
        let mut deserializer = Deserializer::new(data);
        let mut header = vec![0u8; header_size(&schema)];
        deserializer.copy_bytes(&mut header);

        let mut tuples = Vec::with_capacity(slots);
        for slot in 0..slots {
            if is_set(&header, slot) {
                let values = schema
                    .columns()
                    .iter()
                    .map(|col| deserializer.deserialize_value(col.type_id()))
                    .collect();
                let mut tuple = Tuple::new(values);
                tuple.set_record_id((page_id, slot as Slot));
                tuples.push(Some(tuple));
            } else {
                deserializer.skip(schema.tuple_size());
                tuples.push(None);
            }
        }

        Ok(Self {
            page_id,
            schema,
            header,
            tuples,
            dirtier: None,
        })
    }

    /// An empty page that does not belong to any table, used for unassigned buffers
    pub fn unassigned() -> Self {
        Self {
            page_id: INVALID_PAGE_ID,
            schema: EMPTY_SCHEMA.clone(),
            header: vec![],
            tuples: vec![],
            dirtier: None,
        }
    }

    /// The bytes of a freshly allocated page without any tuples
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; PAGE_SIZE]
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn num_unused_slots(&self) -> usize {
        self.tuples.iter().filter(|tuple| tuple.is_none()).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        is_set(&self.header, slot)
    }

    pub fn tuple(&self, slot: usize) -> Option<&Tuple> {
        self.tuples.get(slot).and_then(|tuple| tuple.as_ref())
    }

    /// Returns the first used slot at or after `from` together with its tuple
    pub fn next_used_slot(&self, from: usize) -> Option<(usize, &Tuple)> {
        self.tuples
            .iter()
            .enumerate()
            .skip(from)
            .find_map(|(slot, tuple)| tuple.as_ref().map(|tuple| (slot, tuple)))
    }

    /// Iterates over all tuples stored on this page in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }

    /// Places a tuple into the lowest free slot and assigns it its record id
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId> {
        if !self.schema.matches(&tuple) {
            return Err(DbError::SchemaMismatch {
                expected: self.schema.to_string(),
                found: format!("{:?}", tuple.values()),
            }
            .into());
        }
        let slot = self
            .tuples
            .iter()
            .position(|tuple| tuple.is_none())
            .ok_or(DbError::PageFull(self.page_id))?;

        let record_id = (self.page_id, slot as Slot);
        tuple.set_record_id(record_id);
        self.tuples[slot] = Some(tuple);
        set_bit(&mut self.header, slot, true);
        Ok(record_id)
    }

    /// Clears the slot referenced by the tuple's record id
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let (page_id, slot) = tuple.record_id().ok_or(DbError::MissingRecordId)?;
        if page_id != self.page_id {
            return Err(DbError::NotInTable {
                record_id: (page_id, slot),
                table_id: self.page_id.0,
            }
            .into());
        }
        let slot = slot as usize;
        if !self.is_slot_used(slot) {
            return Err(DbError::SlotEmpty { page_id, slot: slot as Slot }.into());
        }
        self.tuples[slot] = None;
        set_bit(&mut self.header, slot, false);
        Ok(())
    }

    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        self.dirtier = dirtier;
    }

    /// Returns the transaction that last dirtied this page, if it is dirty
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Encodes the page to exactly PAGE_SIZE bytes
    pub fn page_data(&self) -> Vec<u8> {
        let mut data = vec![0u8; PAGE_SIZE];
        let mut serializer = Serializer::new(&mut data);
        serializer.copy_bytes(&self.header);
        for tuple in &self.tuples {
            match tuple {
                Some(tuple) => {
                    for value in tuple.values() {
                        serializer.serialize_value(value);
                    }
                }
                None => serializer.zero_bytes(self.schema.tuple_size()),
            }
        }
        data
    }
}

fn is_set(header: &[u8], slot: usize) -> bool {
    header
        .get(slot / 8)
        .map(|byte| byte & (1 << (slot % 8)) != 0)
        .unwrap_or(false)
}

fn set_bit(header: &mut [u8], slot: usize, used: bool) {
    let mask = 1 << (slot % 8);
    if used {
        header[slot / 8] |= mask;
    } else {
        header[slot / 8] &= !mask;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{header_size, num_slots, HeapPage};
    use crate::common::PAGE_SIZE;
    use crate::error::DbError;
    use crate::tuple::schema::{Schema, TypeId};
    use crate::tuple::value::Value;
    use crate::tuple::Tuple;

    fn int_schema() -> Arc<Schema> {
        Arc::new(Schema::from_types(&[TypeId::Integer, TypeId::Integer]))
    }

    fn pair(a: i32, b: i32) -> Tuple {
        Tuple::new(vec![Value::Integer(a), Value::Integer(b)])
    }

    #[test]
    fn slot_count_follows_tuple_width() {
        let schema = int_schema();
        // 8 byte tuples + 1 header bit each
        assert_eq!(num_slots(&schema), (PAGE_SIZE * 8) / 65);
        assert_eq!(header_size(&schema), num_slots(&schema).div_ceil(8));
        assert!(header_size(&schema) + num_slots(&schema) * 8 <= PAGE_SIZE);
    }

    #[test]
    fn empty_page_round_trip() {
        let schema = int_schema();
        let page = HeapPage::new((1, 0), schema.clone(), &HeapPage::empty_page_data()).unwrap();
        assert_eq!(page.num_unused_slots(), num_slots(&schema));
        assert_eq!(page.iter().count(), 0);
        assert_eq!(page.page_data(), HeapPage::empty_page_data());
    }

    #[test]
    fn full_page_round_trip() {
        let schema = int_schema();
        let mut page = HeapPage::new((1, 3), schema.clone(), &HeapPage::empty_page_data()).unwrap();
        let slots = page.num_slots();
        for i in 0..slots {
            page.insert_tuple(pair(i as i32, -(i as i32))).unwrap();
        }
        assert_eq!(page.num_unused_slots(), 0);
        let err = page.insert_tuple(pair(0, 0)).unwrap_err();
        assert_eq!(err.downcast_ref::<DbError>(), Some(&DbError::PageFull((1, 3))));

        let data = page.page_data();
        assert_eq!(data.len(), PAGE_SIZE);
        let decoded = HeapPage::new((1, 3), schema, &data).unwrap();
        assert_eq!(decoded.num_unused_slots(), 0);
        for (slot, tuple) in decoded.iter().enumerate() {
            assert_eq!(tuple.values(), pair(slot as i32, -(slot as i32)).values());
            assert_eq!(tuple.record_id(), Some(((1, 3), slot as u16)));
        }
        assert_eq!(decoded.page_data(), data);
    }

    #[test]
    fn insert_uses_lowest_free_slot() {
        let mut page = HeapPage::new((1, 0), int_schema(), &HeapPage::empty_page_data()).unwrap();
        for i in 0..3 {
            page.insert_tuple(pair(i, i)).unwrap();
        }
        let middle = page.tuple(1).unwrap().clone();
        page.delete_tuple(&middle).unwrap();
        assert!(!page.is_slot_used(1));
        assert_eq!(page.next_used_slot(1).map(|(slot, _)| slot), Some(2));

        let record_id = page.insert_tuple(pair(9, 9)).unwrap();
        assert_eq!(record_id, ((1, 0), 1));
        assert_eq!(page.tuple(1), Some(&{
            let mut expected = pair(9, 9);
            expected.set_record_id(record_id);
            expected
        }));
    }

    #[test]
    fn delete_rejects_foreign_and_empty_slots() {
        let mut page = HeapPage::new((1, 0), int_schema(), &HeapPage::empty_page_data()).unwrap();
        page.insert_tuple(pair(1, 1)).unwrap();

        let unlocated = pair(1, 1);
        let err = page.delete_tuple(&unlocated).unwrap_err();
        assert_eq!(err.downcast_ref::<DbError>(), Some(&DbError::MissingRecordId));

        let mut foreign = pair(1, 1);
        foreign.set_record_id(((2, 0), 0));
        let err = page.delete_tuple(&foreign).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::NotInTable { .. })
        ));
        assert!(page.is_slot_used(0));

        let mut empty = pair(1, 1);
        empty.set_record_id(((1, 0), 5));
        let err = page.delete_tuple(&empty).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbError>(),
            Some(&DbError::SlotEmpty {
                page_id: (1, 0),
                slot: 5
            })
        );
    }

    #[test]
    fn decoding_a_truncated_buffer_fails() {
        let err = HeapPage::new((1, 0), int_schema(), &[0u8; 100]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::ShortRead { read: 100, .. })
        ));
    }

    #[test]
    fn rejects_tuples_of_other_schema() {
        let mut page = HeapPage::new((1, 0), int_schema(), &HeapPage::empty_page_data()).unwrap();
        let err = page
            .insert_tuple(Tuple::new(vec![Value::from("x"), Value::Integer(1)]))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::SchemaMismatch { .. })
        ));
    }
}
