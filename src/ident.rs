macro_rules! identifier {
    ($name: ident) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Display,
            derive_more::From,
            derive_more::Into,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(usize);

        impl $name {
            pub const ZERO: $name = Self::new(0);
            pub const ONE: $name = Self::new(1);

            pub const fn new(value: usize) -> Self {
                Self(value)
            }

            pub const fn into_usize(self) -> usize {
                self.0
            }
        }
    };
}

identifier!(NodeId);
identifier!(StreamId);

impl NodeId {
    /// The exogenous-arrival pseudo-node. Its calendar slot holds the next arrival.
    pub const DISPATCHER: NodeId = NodeId::ZERO;

    pub const fn is_dispatcher(self) -> bool {
        self.0 == 0
    }

    // Service nodes are numbered from one, their state lives at `id - 1`.
    pub(crate) const fn slot(self) -> usize {
        self.0 - 1
    }
}
