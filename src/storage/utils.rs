use crate::tuple::schema::TypeId;
use crate::tuple::value::Value;

/// Writes values sequentially into a page buffer
pub(in crate::storage) struct Serializer<'a> {
    buffer: &'a mut [u8],
    pos: usize,
}

impl<'a> Serializer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn serialize_value(&mut self, value: &Value) {
        value.serialize_value(&mut self.buffer[self.pos..]);
        self.pos += value.size();
    }

    /// Zero-fills the next `count` bytes, e.g. for an empty slot
    pub fn zero_bytes(&mut self, count: usize) {
        self.buffer[self.pos..self.pos + count].fill(0);
        self.pos += count;
    }

    pub fn copy_bytes(&mut self, bytes: &[u8]) {
        self.buffer[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    pub fn end(self) -> usize {
        self.pos
    }
}

/// Reads values sequentially from a page buffer
pub(in crate::storage) struct Deserializer<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> Deserializer<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, pos: 0 }
    }

    pub fn deserialize_value(&mut self, type_id: TypeId) -> Value {
        let value = Value::parse_value(&self.buffer[self.pos..], type_id);
        self.pos += type_id.len();
        value
    }

    pub fn skip(&mut self, count: usize) {
        self.pos += count;
    }

    pub fn copy_bytes(&mut self, dest: &mut [u8]) {
        dest.copy_from_slice(&self.buffer[self.pos..self.pos + dest.len()]);
        self.pos += dest.len();
    }
}
