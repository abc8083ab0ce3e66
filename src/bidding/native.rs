// src/bidding/native.rs

//! Native creatives render inside nested iframes that cannot reach the page's native
//! callback directly. The callback and payload are parked in a registry on the top
//! window, keyed by ad id, and the creative markup carries a small script that climbs
//! the frame chain to find and invoke them.

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::model::NativeCallback;

/// Frames climbed before giving up.
pub const MAX_PARENT_DEPTH: usize = 10;
pub const NATIVE_SLOTS_GLOBAL: &str = "criteo_prebid_native_slots";

static TOP_WINDOW_SLOTS: Lazy<Arc<NativeSlotRegistry>> =
    Lazy::new(|| Arc::new(NativeSlotRegistry::default()));

/// Process-wide registry, the equivalent of the top window's global.
pub fn top_window_slots() -> Arc<NativeSlotRegistry> {
    TOP_WINDOW_SLOTS.clone()
}

#[derive(Debug, Clone)]
pub struct NativeSlot {
    pub callback: Option<NativeCallback>,
    pub payload: Value,
}

#[derive(Debug, Default)]
pub struct NativeSlotRegistry {
    slots: RwLock<HashMap<String, NativeSlot>>,
}

impl NativeSlotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, ad_id: &str, callback: Option<NativeCallback>, payload: Value) {
        match self.slots.write() {
            Ok(mut slots) => {
                slots.insert(ad_id.to_string(), NativeSlot { callback, payload });
            }
            Err(e) => warn!(ad_id, error = %e, "native slot registry poisoned"),
        }
    }

    pub fn get(&self, ad_id: &str) -> Option<NativeSlot> {
        self.slots.read().ok()?.get(ad_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.slots.read().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes the parked callback with its payload. False when nothing can be called.
    pub fn dispatch(&self, ad_id: &str) -> bool {
        match self.get(ad_id) {
            Some(NativeSlot {
                callback: Some(callback),
                payload,
            }) => {
                callback.call(&payload);
                true
            }
            Some(_) => {
                debug!(ad_id, "native slot has no callback");
                false
            }
            None => false,
        }
    }
}

/// Parks the callback on the registry and returns the creative markup that reaches it.
pub fn create_native_ad(
    registry: &NativeSlotRegistry,
    ad_id: &str,
    payload: &Value,
    callback: Option<NativeCallback>,
) -> String {
    registry.register(ad_id, callback, payload.clone());
    bootstrap_script(ad_id)
}

/// Quotes `text` as a JS string literal that cannot close the surrounding script element.
fn script_string_literal(text: &str) -> String {
    let quoted = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string());
    quoted
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('/', "\\/")
}

pub fn bootstrap_script(ad_id: &str) -> String {
    let id = script_string_literal(ad_id);
    format!(
        r#"<script type="text/javascript">
    var win = window;
    for (var i = 0; i < {depth}; ++i) {{
      win = win.parent;
      if (win.{global}) {{
        var responseSlot = win.{global}[{id}];
        if (responseSlot) {{
          responseSlot.callback(responseSlot.payload);
        }}
        break;
      }}
    }}
  </script>"#,
        depth = MAX_PARENT_DEPTH,
        global = NATIVE_SLOTS_GLOBAL,
        id = id,
    )
}

/// A window in the frame hierarchy, for hosts that render creatives in-process.
pub trait Frame {
    fn parent(&self) -> Option<&dyn Frame>;
    fn native_slots(&self) -> Option<&NativeSlotRegistry>;
}

/// Same walk the bootstrap script performs: parents only, at most [`MAX_PARENT_DEPTH`],
/// stopping at the first frame that owns a registry.
pub fn render_from_frame(frame: &dyn Frame, ad_id: &str) -> bool {
    let mut current = frame;
    for _ in 0..MAX_PARENT_DEPTH {
        current = match current.parent() {
            Some(parent) => parent,
            None => return false,
        };
        if let Some(registry) = current.native_slots() {
            return registry.dispatch(ad_id);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct TestFrame<'a> {
        parent: Option<&'a TestFrame<'a>>,
        slots: Option<&'a NativeSlotRegistry>,
    }

    impl Frame for TestFrame<'_> {
        fn parent(&self) -> Option<&dyn Frame> {
            self.parent.map(|p| p as &dyn Frame)
        }

        fn native_slots(&self) -> Option<&NativeSlotRegistry> {
            self.slots
        }
    }

    fn recording_callback() -> (NativeCallback, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (NativeCallback::new(move |p| sink.lock().unwrap().push(p.clone())), seen)
    }

    #[test]
    fn script_names_the_registry_and_quotes_the_id() {
        let script = bootstrap_script("ad\"1");
        assert!(script.contains("criteo_prebid_native_slots[\"ad\\\"1\"]"));
        assert!(script.contains("i < 10"));
    }

    #[test]
    fn vendor_id_cannot_close_the_script_element() {
        let script = bootstrap_script("x</script><img src=y onerror=alert(1)>");
        assert_eq!(script.matches("</script>").count(), 1);
        assert!(!script.contains("<img"));
        assert!(script.contains(r#"["x\u003c\/script\u003e\u003cimg src=y onerror=alert(1)\u003e"]"#));
    }

    #[test]
    fn create_native_ad_registers_payload() {
        let registry = NativeSlotRegistry::new();
        let (callback, seen) = recording_callback();
        let markup = create_native_ad(&registry, "ad-1", &json!({"title": "t"}), Some(callback));
        assert!(markup.starts_with("<script"));
        assert!(registry.dispatch("ad-1"));
        assert_eq!(*seen.lock().unwrap(), vec![json!({"title": "t"})]);
    }

    #[test]
    fn slot_without_callback_does_not_dispatch() {
        let registry = NativeSlotRegistry::new();
        registry.register("ad-2", None, json!({}));
        assert!(!registry.dispatch("ad-2"));
        assert!(!registry.dispatch("missing"));
    }

    #[test]
    fn walk_finds_registry_a_few_frames_up() {
        let registry = NativeSlotRegistry::new();
        let (callback, seen) = recording_callback();
        registry.register("ad-3", Some(callback), json!(1));

        let top = TestFrame { parent: None, slots: Some(&registry) };
        let middle = TestFrame { parent: Some(&top), slots: None };
        let creative = TestFrame { parent: Some(&middle), slots: None };

        assert!(render_from_frame(&creative, "ad-3"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn walk_skips_the_starting_frame_and_is_bounded() {
        let registry = NativeSlotRegistry::new();
        let (callback, _) = recording_callback();
        registry.register("ad-4", Some(callback), json!(1));

        let lonely = TestFrame { parent: None, slots: Some(&registry) };
        assert!(!render_from_frame(&lonely, "ad-4"));

        // Registry eleven levels up is out of reach, ten levels up is fine.
        let mut current: &TestFrame = Box::leak(Box::new(TestFrame { parent: None, slots: Some(&registry) }));
        for _ in 0..=MAX_PARENT_DEPTH {
            current = Box::leak(Box::new(TestFrame { parent: Some(current), slots: None }));
        }
        assert!(!render_from_frame(current, "ad-4"));

        let one_closer = current.parent.unwrap();
        assert!(render_from_frame(one_closer, "ad-4"));
    }
}
