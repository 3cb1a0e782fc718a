use std::marker::PhantomData;
use std::ptr::copy_nonoverlapping;

/// Cursor over a caller-provided byte buffer.
///
/// Bounds are the caller's business; the `*_unchecked` writes trade checks
/// for speed and must stay within `cap`.
pub struct Writer<'a> {
    ptr: *mut u8,
    pos: usize,
    cap: usize,
    _marker: PhantomData<&'a mut u8>,
}

impl<'a> Writer<'a> {
    #[inline]
    pub fn new(w: &'a mut [u8]) -> Self {
        Writer {
            ptr: w.as_mut_ptr(),
            pos: 0,
            cap: w.len(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn pos(&self) -> usize { self.pos }

    #[inline]
    pub const fn remaining(&self) -> usize { self.cap - self.pos }

    /// # Safety
    ///
    /// Caller must ensure `src.len() <= self.remaining()`.
    #[inline]
    pub unsafe fn write_unchecked(&mut self, src: &[u8]) -> usize {
        let len = src.len();
        copy_nonoverlapping(src.as_ptr(), self.ptr.add(self.pos), len);
        self.pos += len;
        len
    }

    #[inline]
    pub fn write_or_err<F, E>(&mut self, src: &[u8], f: F) -> Result<usize, E>
    where
        F: Fn() -> E,
        E: std::error::Error,
    {
        if self.remaining() < src.len() {
            Err(f())
        } else {
            Ok(unsafe { self.write_unchecked(src) })
        }
    }
}
