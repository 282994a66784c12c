use crate::{Error, FromWire};

/// Cursor over an immutable input buffer with the BRC-100 primitive
/// decodings. Every read is bounds-checked; running off the end yields
/// [`Error::UnexpectedEof`] rather than a panic.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.remaining() < n {
            return Err(Error::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32, Error> {
        let b: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(u32::from_le_bytes(b))
    }

    pub fn get_u64(&mut self) -> Result<u64, Error> {
        let b: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(u64::from_le_bytes(b))
    }

    pub fn get_i64(&mut self) -> Result<i64, Error> {
        let b: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(i64::from_le_bytes(b))
    }

    pub fn get_varint(&mut self) -> Result<u64, Error> {
        match self.get_u8()? {
            n @ 0..=0xFC => Ok(n as u64),
            0xFD => {
                let b: [u8; 2] = self.take(2)?.try_into().unwrap();
                Ok(u16::from_le_bytes(b) as u64)
            }
            0xFE => {
                let b: [u8; 4] = self.take(4)?.try_into().unwrap();
                Ok(u32::from_le_bytes(b) as u64)
            }
            _ => {
                let b: [u8; 8] = self.take(8)?.try_into().unwrap();
                Ok(u64::from_le_bytes(b))
            }
        }
    }

    /// A declared length must fit the remaining input before we try to
    /// allocate for it.
    fn get_len(&mut self) -> Result<usize, Error> {
        let n = self.get_varint()?;
        if n > self.remaining() as u64 {
            return Err(Error::LengthOutOfBounds(n));
        }
        Ok(n as usize)
    }

    pub fn get_var_bytes(&mut self) -> Result<Vec<u8>, Error> {
        let n = self.get_len()?;
        Ok(self.take(n)?.to_vec())
    }

    pub fn get_string(&mut self) -> Result<String, Error> {
        let bytes = self.get_var_bytes()?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    pub fn get_bool(&mut self) -> Result<bool, Error> {
        match self.get_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(Error::InvalidDiscriminant { what: "bool", value }),
        }
    }

    pub fn get_option<T: FromWire>(&mut self) -> Result<Option<T>, Error> {
        match self.get_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::from_wire(self)?)),
            value => Err(Error::InvalidDiscriminant {
                what: "presence flag",
                value,
            }),
        }
    }

    pub fn get_option_with<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<Option<T>, Error> {
        match self.get_u8()? {
            0 => Ok(None),
            1 => Ok(Some(f(self)?)),
            value => Err(Error::InvalidDiscriminant {
                what: "presence flag",
                value,
            }),
        }
    }

    pub fn get_seq<T: FromWire>(&mut self) -> Result<Vec<T>, Error> {
        let n = self.get_varint()?;
        // Each element takes at least one byte; anything larger is a
        // corrupt count, not a huge allocation.
        if n > self.remaining() as u64 {
            return Err(Error::LengthOutOfBounds(n));
        }
        let mut items = Vec::with_capacity(n as usize);
        for _ in 0..n {
            items.push(T::from_wire(self)?);
        }
        Ok(items)
    }
}

impl FromWire for String {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        r.get_string()
    }
}

impl FromWire for Vec<u8> {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        r.get_var_bytes()
    }
}

impl FromWire for bool {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        r.get_bool()
    }
}

impl FromWire for u32 {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        r.get_u32()
    }
}

impl FromWire for u64 {
    fn from_wire(r: &mut Reader) -> Result<Self, Error> {
        r.get_u64()
    }
}
