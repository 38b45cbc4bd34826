pub use crate::external::backend::DisplayDescriptor;

/// Displays in the order the backend listed them.
///
/// The list is never re-sorted and never de-duplicated; uniqueness of ids is
/// the backend's responsibility.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayList(Vec<DisplayDescriptor>);

impl DisplayList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DisplayDescriptor> {
        self.0.iter()
    }

    pub fn get(&self, id: &str) -> Option<&DisplayDescriptor> {
        self.0.iter().find(|d| d.id == id)
    }

    /// Descriptor at the given presentation position.
    pub fn at(&self, position: usize) -> Option<&DisplayDescriptor> {
        self.0.get(position)
    }

    /// Overwrite the brightness of the descriptors with the given id.
    ///
    /// Returns whether anything matched. Nothing else in the list is touched.
    pub fn set_brightness(&mut self, id: &str, value: u16) -> bool {
        let mut matched = false;
        for descriptor in self.0.iter_mut().filter(|d| d.id == id) {
            descriptor.brightness = value;
            matched = true;
        }
        matched
    }
}

impl From<Vec<DisplayDescriptor>> for DisplayList {
    fn from(displays: Vec<DisplayDescriptor>) -> Self {
        DisplayList(displays)
    }
}

/// What the rendering surface gets to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayState {
    /// The initial load hasn't succeeded (yet)
    Loading,
    /// The backend listed these displays
    Loaded(DisplayList),
}

impl DisplayState {
    pub fn displays(&self) -> Option<&DisplayList> {
        match self {
            DisplayState::Loading => None,
            DisplayState::Loaded(list) => Some(list),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, DisplayState::Loading)
    }

    /// Apply a brightness change, see [DisplayList::set_brightness].
    ///
    /// Always a no-op while loading.
    pub fn set_brightness(&mut self, id: &str, value: u16) -> bool {
        match self {
            DisplayState::Loading => false,
            DisplayState::Loaded(list) => list.set_brightness(id, value),
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        DisplayState::Loading
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn three_displays() -> DisplayList {
        DisplayList::from(vec![
            DisplayDescriptor::new("d1", "Main", 50),
            DisplayDescriptor::new("d2", "Side", 30),
            DisplayDescriptor::new("d3", "TV", 100),
        ])
    }

    #[test]
    fn test_set_brightness_touches_one_descriptor() {
        let mut list = three_displays();
        let before = list.clone();
        assert!(list.set_brightness("d2", 75));
        assert_eq!(list.get("d2").unwrap().brightness, 75);
        assert_eq!(list.at(0), before.at(0));
        assert_eq!(list.at(2), before.at(2));
        let ids: Vec<_> = list.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn test_unknown_id_is_noop() {
        let mut list = three_displays();
        assert!(!list.set_brightness("nope", 10));
        assert_eq!(list, three_displays());
    }

    #[test]
    fn test_out_of_range_is_stored() {
        let mut list = three_displays();
        assert!(list.set_brightness("d1", 250));
        assert_eq!(list.get("d1").unwrap().brightness, 250);
    }

    #[test]
    fn test_duplicate_ids_kept_and_updated_together() {
        let mut list = DisplayList::from(vec![
            DisplayDescriptor::new("dup", "A", 10),
            DisplayDescriptor::new("other", "B", 20),
            DisplayDescriptor::new("dup", "C", 30),
        ]);
        assert_eq!(list.len(), 3);
        list.set_brightness("dup", 55);
        let brightnesses: Vec<_> = list.iter().map(|d| d.brightness).collect();
        assert_eq!(brightnesses, vec![55, 20, 55]);
    }

    #[test]
    fn test_loading_state_ignores_changes() {
        let mut state = DisplayState::default();
        assert!(state.is_loading());
        assert!(!state.set_brightness("d1", 10));
        assert_eq!(state, DisplayState::Loading);
        assert!(state.displays().is_none());
    }
}
