//! Host object layout and owned strided buffers.
//!
//! Generated steppers do not receive typed arguments. They receive one
//! untyped pointer to an argument bundle and walk it at fixed byte offsets:
//!
//! ```text
//! bundle table            ArrayObject                 storage
//! ┌──────────────┐        ┌──────────────┐            ┌────┬────┬────┐
//! │ slot 0 ──────┼──────► │ header       │     ┌────► │ e0 │ e1 │ .. │
//! │ slot 1       │        │ data ────────┼─────┘      └────┴────┴────┘
//! │ ...          │        │ ndim         │
//! │ slot n (out) │        │ dims         │
//! └──────────────┘        │ strides ─────┼──► [stride_bytes]
//!                         └──────────────┘
//! ```
//!
//! Every offset the code generator emits comes from [`layout`], which derives
//! them from the `#[repr(C)]` definitions below. Changing a field order here
//! changes the generated code accordingly.

use std::ffi::c_void;
use std::fmt;
use std::mem::{offset_of, size_of};
use std::os::raw::c_char;
use std::ptr::{self, NonNull};

use crate::error::{CoreError, Result};
use crate::registry::ElementKind;
use crate::signature::KernelShape;

/// Type tag stored in the header of every array object.
pub const ARRAY_TYPE_TAG: usize = 0x4152_5259;

/// Common header of every host object.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Reference count.
    pub refcount: isize,
    /// Object type tag.
    pub type_tag: usize,
}

impl ObjectHeader {
    /// Header with a single reference.
    pub const fn new(type_tag: usize) -> Self {
        Self {
            refcount: 1,
            type_tag,
        }
    }
}

/// Host scalar object. The registry's `value_offset` points at `value`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ScalarObject<T> {
    /// Object header.
    pub header: ObjectHeader,
    /// Scalar payload.
    pub value: T,
}

/// Host array object read by generated steppers.
#[repr(C)]
#[derive(Debug)]
pub struct ArrayObject {
    /// Object header.
    pub header: ObjectHeader,
    /// Base pointer of element storage.
    pub data: *mut u8,
    /// Number of axes.
    pub ndim: i32,
    /// Per-axis element counts.
    pub dims: *const isize,
    /// Per-axis byte strides.
    pub strides: *const isize,
}

/// Byte offsets baked into generated stepper source.
pub mod layout {
    use super::*;

    /// Offset of the data pointer inside [`ArrayObject`].
    pub const ARRAY_DATA_OFFSET: usize = offset_of!(ArrayObject, data);

    /// Offset of the strides pointer inside [`ArrayObject`].
    pub const ARRAY_STRIDES_OFFSET: usize = offset_of!(ArrayObject, strides);

    /// Size of one bundle table slot.
    pub const BUNDLE_SLOT_SIZE: usize = size_of::<*const ArrayObject>();

    /// Byte offset of bundle slot `slot`.
    pub const fn bundle_slot_offset(slot: usize) -> usize {
        slot * BUNDLE_SLOT_SIZE
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for f64 {}
    impl Sealed for *const std::os::raw::c_char {}
}

/// Rust types that can live in a [`StridedBuffer`].
pub trait Element: Copy + sealed::Sealed + 'static {
    /// Matching element kind.
    const KIND: ElementKind;
}

impl Element for i32 {
    const KIND: ElementKind = ElementKind::Int;
}

impl Element for f64 {
    const KIND: ElementKind = ElementKind::Double;
}

impl Element for *const c_char {
    const KIND: ElementKind = ElementKind::CString;
}

/// Array object together with the axis arrays it points at.
#[repr(C)]
struct ArrayAllocation {
    object: ArrayObject,
    dims: [isize; 1],
    strides: [isize; 1],
}

/// One-dimensional host array with its own storage.
///
/// Elements are `stride_bytes()` apart; a step greater than one leaves gaps
/// between consecutive elements, the same way a sliced view does.
pub struct StridedBuffer {
    array: NonNull<ArrayAllocation>,
    storage: NonNull<u64>,
    words: usize,
    kind: ElementKind,
    len: usize,
    step: usize,
}

// Safety: the buffer exclusively owns both allocations. Concurrent writes only
// happen through the raw object pointer while a dispatch owns the bundle.
unsafe impl Send for StridedBuffer {}
unsafe impl Sync for StridedBuffer {}

impl StridedBuffer {
    /// Zero-filled contiguous buffer.
    pub fn zeroed(kind: ElementKind, len: usize) -> Self {
        Self::zeroed_with_step(kind, len, 1)
    }

    /// Zero-filled buffer whose elements are `step` element-widths apart.
    pub fn zeroed_with_step(kind: ElementKind, len: usize, step: usize) -> Self {
        let step = step.max(1);
        let stride = kind.size() * step;
        let words = (len * stride).div_ceil(size_of::<u64>());

        let storage = NonNull::from(Box::leak(vec![0u64; words].into_boxed_slice())).cast::<u64>();

        let array = NonNull::from(Box::leak(Box::new(ArrayAllocation {
            object: ArrayObject {
                header: ObjectHeader::new(ARRAY_TYPE_TAG),
                data: storage.as_ptr().cast::<u8>(),
                ndim: 1,
                dims: ptr::null(),
                strides: ptr::null(),
            },
            dims: [len as isize],
            strides: [stride as isize],
        })));

        // SAFETY: `array` was just leaked from a Box and is not aliased.
        unsafe {
            let raw = array.as_ptr();
            (*raw).object.dims = ptr::addr_of!((*raw).dims).cast::<isize>();
            (*raw).object.strides = ptr::addr_of!((*raw).strides).cast::<isize>();
        }

        Self {
            array,
            storage,
            words,
            kind,
            len,
            step,
        }
    }

    /// Contiguous buffer holding a copy of `values`.
    pub fn from_slice<T: Element>(values: &[T]) -> Self {
        Self::from_slice_with_step(values, 1)
    }

    /// Strided buffer holding a copy of `values`, `step` element-widths apart.
    pub fn from_slice_with_step<T: Element>(values: &[T], step: usize) -> Self {
        let buf = Self::zeroed_with_step(T::KIND, values.len(), step);
        for (i, value) in values.iter().enumerate() {
            // SAFETY: kind matches T and i < len.
            unsafe { buf.element_ptr(i).cast::<T>().write(*value) };
        }
        buf
    }

    /// Element kind.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element step in element-widths.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Distance between consecutive elements in bytes.
    pub fn stride_bytes(&self) -> usize {
        self.kind.size() * self.step
    }

    /// The host array object describing this buffer.
    pub fn object(&self) -> &ArrayObject {
        // SAFETY: the allocation lives as long as self.
        unsafe { &(*self.array.as_ptr()).object }
    }

    /// Raw pointer to the host array object.
    pub fn as_object_ptr(&self) -> *const ArrayObject {
        // `object` is the first field of a repr(C) struct.
        self.array.as_ptr().cast::<ArrayObject>().cast_const()
    }

    /// Read element `index`.
    pub fn get<T: Element>(&self, index: usize) -> Result<T> {
        self.check_access::<T>(index)?;
        // SAFETY: kind and bounds checked above.
        Ok(unsafe { self.element_ptr(index).cast::<T>().read() })
    }

    /// Overwrite element `index`.
    pub fn set<T: Element>(&mut self, index: usize, value: T) -> Result<()> {
        self.check_access::<T>(index)?;
        // SAFETY: kind and bounds checked above; &mut self excludes readers.
        unsafe { self.element_ptr(index).cast::<T>().write(value) };
        Ok(())
    }

    /// Copy all elements out.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.check_kind::<T>()?;
        Ok((0..self.len)
            // SAFETY: kind checked above and i < len.
            .map(|i| unsafe { self.element_ptr(i).cast::<T>().read() })
            .collect())
    }

    fn check_kind<T: Element>(&self) -> Result<()> {
        if T::KIND != self.kind {
            return Err(CoreError::KindMismatch {
                expected: T::KIND,
                found: self.kind,
            });
        }
        Ok(())
    }

    fn check_access<T: Element>(&self, index: usize) -> Result<()> {
        self.check_kind::<T>()?;
        if index >= self.len {
            return Err(CoreError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(())
    }

    /// # Safety
    ///
    /// `index` must be below `len`.
    unsafe fn element_ptr(&self, index: usize) -> *mut u8 {
        // SAFETY: caller guarantees the offset stays inside storage.
        unsafe { self.storage.as_ptr().cast::<u8>().add(index * self.stride_bytes()) }
    }
}

impl Clone for StridedBuffer {
    fn clone(&self) -> Self {
        let copy = Self::zeroed_with_step(self.kind, self.len, self.step);
        // SAFETY: both storages hold exactly `words` u64s and do not overlap.
        unsafe { ptr::copy_nonoverlapping(self.storage.as_ptr(), copy.storage.as_ptr(), self.words) };
        copy
    }
}

impl Drop for StridedBuffer {
    fn drop(&mut self) {
        // SAFETY: both pointers came from Box::leak in zeroed_with_step and
        // are released exactly once here.
        unsafe {
            drop(Box::from_raw(self.array.as_ptr()));
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(
                self.storage.as_ptr(),
                self.words,
            )));
        }
    }
}

impl fmt::Debug for StridedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedBuffer")
            .field("kind", &self.kind)
            .field("len", &self.len)
            .field("stride_bytes", &self.stride_bytes())
            .finish()
    }
}

/// Input and result buffers passed to a kernel.
///
/// Slots `0..n` are inputs, slot `n` is the result. The result may share a
/// buffer with an input for in-place evaluation.
#[derive(Debug)]
pub struct ArgumentBundle {
    buffers: Vec<StridedBuffer>,
    slots: Vec<usize>,
    table: Vec<*const ArrayObject>,
}

// Safety: the table only points into `buffers`, which the bundle owns.
unsafe impl Send for ArgumentBundle {}
unsafe impl Sync for ArgumentBundle {}

impl ArgumentBundle {
    /// Start building a bundle.
    pub fn builder() -> BundleBuilder {
        BundleBuilder::default()
    }

    /// Number of input slots.
    pub fn input_count(&self) -> usize {
        self.slots.len() - 1
    }

    /// Input buffer in slot `index`.
    pub fn input(&self, index: usize) -> Option<&StridedBuffer> {
        if index >= self.input_count() {
            return None;
        }
        self.slots.get(index).map(|&b| &self.buffers[b])
    }

    /// The result buffer.
    pub fn result(&self) -> &StridedBuffer {
        &self.buffers[self.result_index()]
    }

    /// Whether the result shares storage with an input.
    pub fn is_in_place(&self) -> bool {
        self.result_index() < self.input_count()
    }

    /// Length of the shared iteration domain.
    pub fn len(&self) -> usize {
        self.result().len()
    }

    /// Whether the domain is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Untyped pointer to the slot table, as handed to a stepper.
    pub fn as_raw(&self) -> *mut c_void {
        self.table.as_ptr().cast_mut().cast::<c_void>()
    }

    /// Check that the bundle fits a kernel shape and `[start, end)` fits the domain.
    pub fn validate(&self, shape: &KernelShape, start: i32, end: i32) -> Result<()> {
        if shape.params.len() != self.input_count() {
            return Err(CoreError::ArityMismatch {
                expected: shape.params.len(),
                found: self.input_count(),
            });
        }

        for (i, &expected) in shape.params.iter().enumerate() {
            let found = self.buffers[self.slots[i]].kind();
            if found != expected {
                return Err(CoreError::KindMismatch { expected, found });
            }
        }

        if self.result().kind() != shape.result {
            return Err(CoreError::KindMismatch {
                expected: shape.result,
                found: self.result().kind(),
            });
        }

        if start < 0 || (end > start && end as usize > self.len()) {
            return Err(CoreError::InvalidRange {
                start,
                end,
                len: self.len(),
            });
        }

        Ok(())
    }

    /// Take the result buffer, dropping the rest.
    pub fn into_result(mut self) -> StridedBuffer {
        let index = self.result_index();
        self.buffers.swap_remove(index)
    }

    /// Take every owned buffer, inputs first.
    pub fn into_buffers(self) -> Vec<StridedBuffer> {
        self.buffers
    }

    fn result_index(&self) -> usize {
        self.slots[self.slots.len() - 1]
    }
}

#[derive(Debug)]
enum ResultSlot {
    Owned(StridedBuffer),
    InPlace(usize),
}

/// Builder for [`ArgumentBundle`].
#[derive(Debug, Default)]
pub struct BundleBuilder {
    inputs: Vec<StridedBuffer>,
    result: Option<ResultSlot>,
}

impl BundleBuilder {
    /// Append an input buffer.
    pub fn input(mut self, buffer: StridedBuffer) -> Self {
        self.inputs.push(buffer);
        self
    }

    /// Append several input buffers.
    pub fn inputs(mut self, buffers: impl IntoIterator<Item = StridedBuffer>) -> Self {
        self.inputs.extend(buffers);
        self
    }

    /// Set a dedicated result buffer.
    pub fn result(mut self, buffer: StridedBuffer) -> Self {
        self.result = Some(ResultSlot::Owned(buffer));
        self
    }

    /// Write results back into input `index`.
    pub fn result_in_place(mut self, index: usize) -> Self {
        self.result = Some(ResultSlot::InPlace(index));
        self
    }

    /// Validate and assemble the bundle.
    pub fn build(self) -> Result<ArgumentBundle> {
        let Self { mut inputs, result } = self;

        let Some(first) = inputs.first() else {
            return Err(CoreError::Bundle(
                "at least one input buffer is required".to_string(),
            ));
        };
        let len = first.len();

        if let Some(i) = inputs.iter().position(|b| b.len() != len) {
            return Err(CoreError::Bundle(format!(
                "input {} has length {}, expected {}",
                i,
                inputs[i].len(),
                len
            )));
        }

        let n = inputs.len();
        let result_index = match result {
            None => {
                return Err(CoreError::Bundle("a result buffer is required".to_string()));
            }
            Some(ResultSlot::Owned(buffer)) => {
                if buffer.len() != len {
                    return Err(CoreError::Bundle(format!(
                        "result has length {}, expected {}",
                        buffer.len(),
                        len
                    )));
                }
                inputs.push(buffer);
                n
            }
            Some(ResultSlot::InPlace(index)) => {
                if index >= n {
                    return Err(CoreError::Bundle(format!(
                        "in-place result refers to input {} but only {} inputs exist",
                        index, n
                    )));
                }
                index
            }
        };

        let slots: Vec<usize> = (0..n).chain(std::iter::once(result_index)).collect();
        let table = slots.iter().map(|&b| inputs[b].as_object_ptr()).collect();

        Ok(ArgumentBundle {
            buffers: inputs,
            slots,
            table,
        })
    }
}
