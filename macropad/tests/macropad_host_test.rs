pub mod common;

mod host_test {
    use macropad::MacroPad;
    use macropad::config::{FIRMWARE_VERSION, MacroPadConfig};
    use macropad::display::LabelStyle;
    use macropad::macro_store::MacroStore;
    use macropad::settings::Settings;
    use macropad::storage::FileStorage;
    use macropad::types::layout::KeyboardLayout;
    use serde_json::{Value, json};

    use crate::common::{Hid, MockDevice, TestPad, at, create_pad, storage_with_macros};

    fn sample_macros() -> Value {
        json!({
            "0": {"type": "group", "label": "Macros", "content": ["1"]},
            "1": {"type": "macro", "label": "Copy", "content": [{"kc": "CONTROL,C"}]},
        })
    }

    /// Connect the host and drop the greeting
    fn connected_pad() -> TestPad {
        let mut pad = create_pad(sample_macros());
        pad.device_mut().connected = true;
        pad.tick(at(0));
        assert_eq!(pad.device_mut().take_lines().len(), 2);
        pad
    }

    fn request(pad: &mut TestPad, line: &str, now: u64) -> Vec<String> {
        pad.device_mut().send_line(line);
        pad.tick(at(now));
        pad.device_mut().take_lines()
    }

    #[test]
    fn test_greeting_on_connect() {
        let mut storage = storage_with_macros(sample_macros());
        storage.set_read_only(true);
        let mut pad: TestPad = MacroPad::new(MockDevice::new(), storage, MacroPadConfig::default());

        pad.tick(at(0));
        assert!(pad.device_mut().take_lines().is_empty());

        pad.device_mut().connected = true;
        pad.tick(at(10));
        assert_eq!(
            pad.device_mut().take_lines(),
            [
                format!("{{\"ACK\":\"version\",\"CONTENT\":\"{}\"}}", FIRMWARE_VERSION),
                "{\"ACK\":\"usbenabled\",\"CONTENT\":true}".to_string(),
            ]
        );
        pad.tick(at(20));
        assert!(pad.device_mut().take_lines().is_empty());
    }

    #[test]
    fn test_input_ignored_while_disconnected() {
        let mut pad = create_pad(sample_macros());
        pad.device_mut().send_line(r#"{"command":"hard_reset"}"#);
        pad.tick(at(0));
        assert_eq!(pad.device().hard_resets, 0);
        assert!(pad.device_mut().take_lines().is_empty());
    }

    #[test]
    fn test_streamed_macros_rebind_keys() {
        let mut pad = connected_pad();
        pad.device_mut().press(0);
        pad.tick(at(5));
        pad.device_mut().release(0);
        pad.tick(at(6));
        pad.device_mut().sleeping = true;

        assert!(request(&mut pad, r#"{"command":"set_macros","content":"start"}"#, 10).is_empty());
        let items = [
            ("2", json!({"type": "macro", "label": "Paste", "content": [{"kc": "CONTROL,V"}]})),
            ("1", json!({"type": "blank"})),
            ("0", json!({"type": "group", "label": "Edit", "content": ["1", "2"]})),
        ];
        for (i, (id, node)) in items.iter().enumerate() {
            let line = json!({"command": "set_macros", "id": id, "content": node.to_string()}).to_string();
            assert!(request(&mut pad, &line, 20 + i as u64).is_empty());
        }
        let lines = request(&mut pad, r#"{"command":"set_macros","content":"end"}"#, 30);
        assert_eq!(lines, [r#"{"ACK":"Macros received","CONTENT":3}"#]);

        assert_eq!(pad.store().len(), 3);
        assert_eq!(pad.device().title, "Edit");
        assert_eq!(pad.device().label(0), "");
        assert_eq!(pad.device().label(1), "Paste");
        assert!(!pad.device().sleeping);
        assert_eq!(pad.navigation().depth(), 1);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut pad = connected_pad();
        request(&mut pad, r#"{"command":"set_macros","content":"start"}"#, 10);
        let node = json!({"type": "group", "label": "Saved", "content": [false]}).to_string();
        let line = json!({"command": "set_macros", "id": "0", "content": node}).to_string();
        request(&mut pad, &line, 11);
        request(&mut pad, r#"{"command":"set_macros","content":"end"}"#, 12);

        let lines = request(&mut pad, r#"{"command":"save_macros"}"#, 13);
        assert_eq!(lines, [r#"{"ACK":"Macros stored"}"#]);

        let storage = pad.storage().clone();
        let reloaded: TestPad = MacroPad::new(MockDevice::new(), storage, MacroPadConfig::default());
        assert_eq!(reloaded.store().len(), 1);
        assert_eq!(reloaded.store().raw("0"), pad.store().raw("0"));
        assert_eq!(reloaded.device().title, "Saved");

        let mut storage = pad.storage().clone();
        assert_eq!(MacroStore::load(&mut storage, "macros.json").to_json(), pad.store().to_json());
    }

    #[test]
    fn test_get_macros_streams_every_node() {
        let mut pad = connected_pad();
        let lines = request(&mut pad, r#"{"command":"get_macros"}"#, 10);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], r#"{"ACK":"macros","CONTENT":"start"}"#);
        assert!(lines[1].starts_with(r#"{"ACK":"macros","ID":"0","CONTENT":"#));
        assert!(lines[2].starts_with(r#"{"ACK":"macros","ID":"1","CONTENT":"#));
        assert_eq!(lines[3], r#"{"ACK":"macros","CONTENT":"end"}"#);
    }

    #[test]
    fn test_invalid_json_recovers_saved_macros() {
        let mut pad = connected_pad();
        request(&mut pad, r#"{"command":"set_macros","content":"start"}"#, 10);
        let node = json!({"type": "group", "label": "Partial", "content": []}).to_string();
        let line = json!({"command": "set_macros", "id": "0", "content": node}).to_string();
        request(&mut pad, &line, 11);
        request(&mut pad, r#"{"command":"set_macros","content":"end"}"#, 12);
        assert_eq!(pad.device().title, "Partial");

        let lines = request(&mut pad, "{\"command\": \"set_macr", 20);
        assert_eq!(lines, [r#"{"ERR":"Invalid json"}"#]);

        // Everything the host sends while recovering is dropped
        let lines = request(&mut pad, r#"{"command":"hard_reset"}"#, 21);
        assert!(lines.is_empty());
        assert_eq!(pad.device().hard_resets, 0);

        pad.tick(at(22));
        assert_eq!(pad.device_mut().take_lines(), [r#"{"WARN":"Reloaded: macros.json"}"#]);
        assert_eq!(pad.device().title, "Macros");
        assert_eq!(pad.store().len(), 2);

        let lines = request(&mut pad, r#"{"command":"soft_reset"}"#, 30);
        assert_eq!(lines, [r#"{"ACK":"Softreset"}"#]);
        assert_eq!(pad.device().soft_resets, 1);
    }

    #[test]
    fn test_protocol_errors_keep_channel_usable() {
        let mut pad = connected_pad();
        let lines = request(&mut pad, r#"{"command":"reboot"}"#, 10);
        assert_eq!(lines, [r#"{"ERR":"Unkown command: reboot"}"#]);
        let lines = request(&mut pad, r#"{"command":"set_settings"}"#, 11);
        assert_eq!(lines, [r#"{"ERR":"No content: {\"command\":\"set_settings\"}"}"#]);
        let lines = request(&mut pad, r#"{"cmd":"get_settings"}"#, 12);
        assert_eq!(lines, [r#"{"ERR":"Wrong payload: {\"cmd\":\"get_settings\"}"}"#]);

        let lines = request(&mut pad, r#"{"command":"get_settings"}"#, 13);
        let response: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(response["ACK"], json!("settings"));
        assert_eq!(response["CONTENT"], Settings::default().to_json());
    }

    #[test]
    fn test_set_settings_applies_and_persists() {
        let mut pad = connected_pad();
        assert_eq!(pad.device().brightness, 0.1);
        assert_eq!(pad.device().labels[0].1, LabelStyle::INVERTED);

        let lines = request(
            &mut pad,
            r#"{"command":"set_settings","content":{"brightness":0.5,"invertcolors":true,"sleeptime":10}}"#,
            10,
        );
        assert_eq!(lines, [r#"{"ACK":"Settings are set"}"#]);
        assert_eq!(pad.settings().brightness, 0.5);
        assert_eq!(pad.device().brightness, 0.5);
        assert_eq!(pad.device().pixel_brightness, 0.5);
        assert_eq!(pad.device().labels[0].1, LabelStyle::NEUTRAL);

        let mut storage = pad.storage().clone();
        let stored = Settings::load(&mut storage, "settings.json");
        assert_eq!(&stored, pad.settings());
        assert_eq!(stored.sleeptime, 10.0);
    }

    #[test]
    fn test_keyboard_layout_reaches_text_output() {
        let macros = json!({
            "0": {"type": "group", "label": "Text", "content": ["1"]},
            "1": {"type": "macro", "label": "Hi", "content": ["yes"]},
        });
        let mut storage = storage_with_macros(macros.clone());
        storage.write("settings.json", br#"{"keyboardlayout":"fr"}"#).unwrap();
        let mut pad: TestPad = MacroPad::new(MockDevice::new(), storage, MacroPadConfig::default());
        pad.device_mut().press(0);
        pad.tick(at(0));
        pad.device_mut().release(0);
        pad.tick(at(1));
        assert_eq!(pad.device_mut().take_hid(), [Hid::Text("yes".to_string(), KeyboardLayout::Fr)]);

        let mut pad = create_pad(macros);
        pad.device_mut().connected = true;
        pad.tick(at(0));
        pad.device_mut().take_lines();
        let lines = request(&mut pad, r#"{"command":"set_settings","content":{"keyboardlayout":"de"}}"#, 10);
        assert_eq!(lines, [r#"{"ACK":"Settings are set"}"#]);
        pad.device_mut().press(0);
        pad.tick(at(20));
        assert_eq!(pad.device_mut().take_hid(), [Hid::Text("yes".to_string(), KeyboardLayout::De)]);
    }

    #[test]
    fn test_huge_sleeptime_never_sleeps() {
        let mut pad = connected_pad();
        let lines = request(&mut pad, r#"{"command":"set_settings","content":{"sleeptime":1e14}}"#, 10);
        assert_eq!(lines, [r#"{"ACK":"Settings are set"}"#]);
        pad.tick(at(100_000_000));
        assert!(!pad.device().sleeping);

        // The saved value is loaded again after a reset
        let storage = pad.storage().clone();
        let mut reloaded: TestPad = MacroPad::new(MockDevice::new(), storage, MacroPadConfig::default());
        assert_eq!(reloaded.settings().sleeptime, 1e14);
        reloaded.tick(at(100_000_000));
        assert!(!reloaded.device().sleeping);
    }

    #[test]
    fn test_read_only_storage_rejects_writes() {
        let mut storage = storage_with_macros(sample_macros());
        storage.set_read_only(true);
        let mut pad: TestPad = MacroPad::new(MockDevice::new(), storage, MacroPadConfig::default());
        pad.device_mut().connected = true;
        pad.tick(at(0));
        pad.device_mut().take_lines();

        let lines = request(&mut pad, r#"{"command":"set_settings","content":{"brightness":1}}"#, 10);
        assert_eq!(lines, [r#"{"ERR":"Cannot set settings because USB storage is enabled"}"#]);
        assert_eq!(pad.settings().brightness, 0.1);
        let lines = request(&mut pad, r#"{"command":"save_macros"}"#, 11);
        assert_eq!(lines, [r#"{"ERR":"Cannot store macros because USB storage is enabled"}"#]);

        // The marker can't be written, so there's no reset
        let lines = request(&mut pad, r#"{"command":"enable_usb"}"#, 12);
        assert_eq!(lines, [r#"{"ACK":"Enable USB"}"#]);
        assert_eq!(pad.device().hard_resets, 0);
    }

    #[test]
    fn test_enable_usb_writes_marker_and_resets() {
        let mut pad = connected_pad();
        let lines = request(&mut pad, r#"{"command":"enable_usb"}"#, 10);
        assert_eq!(lines, [r#"{"ACK":"Enable USB"}"#]);
        assert_eq!(pad.device().hard_resets, 1);
        let mut storage = pad.storage().clone();
        assert!(storage.exists("usbenabled"));

        let lines = request(&mut pad, r#"{"command":"hard_reset"}"#, 11);
        assert_eq!(lines, [r#"{"ACK":"Hardreset"}"#]);
        assert_eq!(pad.device().hard_resets, 2);
    }
}
