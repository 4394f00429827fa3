pub struct Array2d<T> {
    data: Vec<T>,
    size_x: u32,
    size_y: u32,
}

impl<T: Clone> Array2d<T> {
    pub fn with_size(size_x: u32, size_y: u32, value: T) -> Self {
        Self {
            data: vec![value; size_x as usize * size_y as usize],
            size_x,
            size_y,
        }
    }

    #[must_use]
    pub const fn get_index_1d(&self, x: u32, y: u32) -> usize {
        y as usize * self.size_x as usize + x as usize
    }

    #[must_use]
    pub const fn size_x(&self) -> u32 {
        self.size_x
    }

    #[must_use]
    pub const fn size_y(&self) -> u32 {
        self.size_y
    }

    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[must_use]
    pub fn at(&self, x: u32, y: u32) -> &T {
        &self.data[self.get_index_1d(x, y)]
    }

    pub fn at_mut(&mut self, x: u32, y: u32) -> &mut T {
        let index = self.get_index_1d(x, y);
        &mut self.data[index]
    }
}

#[cfg(test)]
mod tests {
    use super::Array2d;

    #[test]
    fn row_major_layout() {
        let mut a = Array2d::with_size(4, 3, 0_u32);
        *a.at_mut(1, 2) = 7;
        assert_eq!(a.data()[2 * 4 + 1], 7);
        assert_eq!(*a.at(1, 2), 7);
        assert_eq!((a.size_x(), a.size_y()), (4, 3));
    }
}
