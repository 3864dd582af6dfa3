use bitflags::bitflags;

bitflags! {
    /// Bitmask classifying a display's purpose. Every display carries at
    /// least one flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Topics: u32 {
        const INTRO        = 1 << 0;
        const MESSAGE      = 1 << 1;
        const MEDIA        = 1 << 2;
        const DISPLAY_TEST = 1 << 3;
        const CLEAR        = 1 << 4;
        const DEMO         = 1 << 5;
        const EXPERIMENT   = 1 << 6;
    }
}
