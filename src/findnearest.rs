use crate::unit::*;

pub trait HasPosition {
    fn position(&self) -> Point2;
}

impl HasPosition for Point2 {
    fn position(&self) -> Point2 {
        *self
    }
}

impl<T: HasPosition> HasPosition for &T {
    fn position(&self) -> Point2 {
        (**self).position()
    }
}

pub trait FindNearestItertools: Iterator {
    fn find_nearest_linear<V>(self, start_pos: Point2) -> Option<V>
    where
        Self: Iterator<Item = V> + Sized,
        V: HasPosition,
    {
        self.map(|pos_object| (start_pos.distance_sq(pos_object.position()), pos_object))
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, pos_object)| pos_object)
    }
}

impl<T: ?Sized> FindNearestItertools for T where T: Iterator {}
