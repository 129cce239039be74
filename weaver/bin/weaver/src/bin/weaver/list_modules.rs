// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::rc::Rc;

use weaver::ModuleRegistry;

pub fn list_modules_main(registry: &Rc<ModuleRegistry>) {
    for module in registry.modules() {
        let mut line = format!("{}\t{}", module.name(), module.kind_name());
        if let Some(target) = module.executable_target() {
            line.push_str(&format!("\t{target}"));
        } else if !module.target_tags().is_empty() {
            line.push_str(&format!("\t{}", module.target_tags()));
        }
        println!("{line}");
    }
}
